use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use rust_decimal::Decimal;
use serde_json::json;
use storefront_api::{
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "admin", "admin@example.com", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "shopper", "user@example.com", "user123", "user").await?;
    let category_id = ensure_category(&pool, "Phones").await?;
    seed_products(&pool, category_id).await?;
    seed_discounts(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn ensure_category(pool: &DbPool, name: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_products(pool: &DbPool, category_id: Uuid) -> anyhow::Result<()> {
    let variants = json!([
        { "ram": "8GB", "rom": "128GB", "price": "45000", "quantity": 1, "count_in_stock": 12 },
        { "ram": "12GB", "rom": "256GB", "price": "52000", "quantity": 1, "count_in_stock": 5 },
    ]);
    let specifications = json!([
        { "key": "Display", "value": "6.5 inch AMOLED" },
        { "key": "Battery", "value": "5000 mAh" },
    ]);
    let products = [
        (
            "Galaxy A55",
            "Mid-range phone",
            "Samsung",
            Decimal::from(45000),
            12,
            specifications.clone(),
            variants,
        ),
        (
            "USB-C Charger",
            "25W fast charger",
            "Anker",
            Decimal::from(1000),
            40,
            json!([{ "key": "Output", "value": "25W" }]),
            json!([]),
        ),
    ];

    for (name, description, brand, price, stock, specs, variants) in products {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, description, brand, category_id, price, quantity, count_in_stock,
                 specifications, variants)
            SELECT $1, $2, $3, $4, $5, $6, 1, $7, $8, $9
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(brand)
        .bind(category_id)
        .bind(price)
        .bind(stock)
        .bind(specs)
        .bind(variants)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_discounts(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO coupons (id, code, discount_percent)
        VALUES ($1, 'SAVE5', 5)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO universities (id, name, email_domain)
        VALUES ($1, 'Example University', 'example.edu')
        ON CONFLICT (email_domain) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .execute(pool)
    .await?;

    println!("Seeded coupon SAVE5 and Example University");
    Ok(())
}
