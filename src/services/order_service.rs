use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    catalog::OrmCatalog,
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_owner_or_admin},
    models::{Order, OrderItem, PaymentConfirmation, orders_from_models},
    orders::{CaptureRequest, Fulfilment, OrderDraft, PaymentProvider, assemble_order},
    pricing::DiscountSource,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::discount_service::OrmDiscountBook,
    state::AppState,
};

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let catalog = OrmCatalog::new(&state.orm);
    let discounts = OrmDiscountBook::new(&state.orm);
    let draft = assemble_order(
        user,
        payload,
        &catalog,
        &discounts,
        &state.settings,
        Utc::now(),
    )
    .await?;

    let txn = state.orm.begin().await?;
    let (order, items) = persist_draft(&txn, &draft).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        discount_source = order.discount_source.as_deref().unwrap_or("none"),
        total = %order.total_price,
        "order created"
    );
    audit::record(
        state,
        user.user_id,
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        with_items(order, items)?,
        Some(Meta::empty()),
    ))
}

async fn persist_draft<C>(conn: &C, draft: &OrderDraft) -> AppResult<(OrderModel, Vec<OrderItem>)>
where
    C: ConnectionTrait,
{
    let shipping_address = serde_json::to_value(&draft.shipping_address)
        .map_err(|err| AppError::Internal(err.into()))?;
    let breakdown = &draft.breakdown;
    let discount = draft.discount.as_ref();
    let coupon_code = discount
        .filter(|d| d.source == DiscountSource::Coupon)
        .map(|d| d.reference.clone());
    let university_name = discount
        .filter(|d| d.source == DiscountSource::Student)
        .map(|d| d.reference.clone());

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(draft.user_id),
        shipping_address: Set(shipping_address),
        payment_method: Set(draft.payment_method.clone()),
        items_price: Set(breakdown.items_price),
        shipping_price: Set(breakdown.shipping_price),
        tax_price: Set(breakdown.tax_price),
        discount_source: Set(discount.map(|d| d.source.as_str().to_string())),
        coupon_code: Set(coupon_code),
        university_name: Set(university_name),
        university_email: Set(discount.and_then(|d| d.university_email.clone())),
        discount_percent: Set(breakdown.discount_percent),
        discount_amount: Set(breakdown.discount_amount),
        total_price: Set(breakdown.total_price),
        is_paid: Set(false),
        paid_at: Set(None),
        payment_result: Set(None),
        is_delivered: Set(false),
        delivered_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(draft.lines.len());
    for line in &draft.lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            name: Set(line.name.clone()),
            image: Set(line.image.clone()),
            price: Set(line.price),
            qty: Set(line.qty),
            variant_ram: Set(line.variant.as_ref().map(|v| v.ram.clone())),
            variant_rom: Set(line.variant.as_ref().map(|v| v.rom.clone())),
            created_at: NotSet,
        }
        .insert(conn)
        .await?;
        items.push(OrderItem::from(item));
    }

    Ok((order, items))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    list_orders_where(state, condition, query).await
}

pub(crate) async fn list_orders_where(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(paid) = query.is_paid {
        condition = condition.add(OrderCol::IsPaid.eq(paid));
    }
    if let Some(delivered) = query.is_delivered {
        condition = condition.add(OrderCol::IsDelivered.eq(delivered));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Orders",
        OrderList {
            items: orders_from_models(orders)?,
        },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_order(&state.orm, id).await?;
    ensure_owner_or_admin(user, order.user_id)?;
    let items = load_items(&state.orm, order.id).await?;
    Ok(ApiResponse::success(
        "Order found",
        with_items(order, items)?,
        Some(Meta::empty()),
    ))
}

/// Amount and currency the payment widget must charge, derived from the
/// persisted order.
pub async fn payment_instructions(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<CaptureRequest>> {
    let order = find_order(&state.orm, id).await?;
    ensure_owner_or_admin(user, order.user_id)?;
    let order = Order::try_from(order)?;
    if order.is_paid {
        return Err(AppError::AlreadyPaid);
    }
    let request = CaptureRequest::for_order(&order, &state.settings.currency)?;
    Ok(ApiResponse::success("Payment amount", request, Some(Meta::empty())))
}

/// Records a confirmation the payment widget already captured.
pub async fn pay_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    confirmation: PaymentConfirmation,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::OrderNotFound)?;
    ensure_owner_or_admin(user, order.user_id)?;

    let order = apply_payment(state, &txn, order, &confirmation, Utc::now()).await?;
    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, capture_id = %confirmation.id, "order paid");
    audit::record(
        state,
        user.user_id,
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": order.id, "capture_id": confirmation.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment recorded",
        with_items(order, items)?,
        Some(Meta::empty()),
    ))
}

/// Asks `provider` to charge exactly the stored total, then marks the order
/// paid. The two steps are not atomic: a failure after a successful capture
/// leaves a charged, unpaid order, which is logged for reconciliation.
pub async fn capture_and_settle<P>(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    provider: &P,
) -> AppResult<ApiResponse<OrderWithItems>>
where
    P: PaymentProvider + ?Sized,
{
    let order = find_order(&state.orm, id).await?;
    ensure_owner_or_admin(user, order.user_id)?;
    let snapshot = Order::try_from(order)?;
    if snapshot.is_paid && state.settings.orders.reject_repeat_payment {
        return Err(AppError::AlreadyPaid);
    }

    let request = CaptureRequest::for_order(&snapshot, &state.settings.currency)?;
    let confirmation = provider.capture(&request).await?;

    match pay_order(state, user, id, confirmation.clone()).await {
        Ok(resp) => Ok(resp),
        Err(err) => {
            tracing::error!(
                order_id = %id,
                capture_id = %confirmation.id,
                error = %err,
                "payment captured but order not marked paid"
            );
            Err(err)
        }
    }
}

pub async fn deliver_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    let now = Utc::now();
    let next = fulfilment_of(&order).mark_delivered(&state.settings.orders, now)?;
    let mut active: OrderActive = order.into();
    active.is_delivered = Set(next.is_delivered);
    active.delivered_at = Set(next.delivered_at.map(Into::into));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;
    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, "order delivered");
    audit::record(
        state,
        user.user_id,
        "order_delivered",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order delivered",
        with_items(order, items)?,
        Some(Meta::empty()),
    ))
}

async fn apply_payment<C>(
    state: &AppState,
    conn: &C,
    order: OrderModel,
    confirmation: &PaymentConfirmation,
    now: DateTime<Utc>,
) -> AppResult<OrderModel>
where
    C: ConnectionTrait,
{
    let next = fulfilment_of(&order).mark_paid(
        order.total_price,
        confirmation,
        &state.settings.orders,
        now,
    )?;
    let payment_result =
        serde_json::to_value(confirmation).map_err(|err| AppError::Internal(err.into()))?;

    let mut active: OrderActive = order.into();
    active.is_paid = Set(next.is_paid);
    active.paid_at = Set(next.paid_at.map(Into::into));
    active.payment_result = Set(Some(payment_result));
    active.updated_at = Set(now.into());
    Ok(active.update(conn).await?)
}

fn fulfilment_of(order: &OrderModel) -> Fulfilment {
    Fulfilment {
        is_paid: order.is_paid,
        paid_at: order.paid_at.map(|dt| dt.with_timezone(&Utc)),
        is_delivered: order.is_delivered,
        delivered_at: order.delivered_at.map(|dt| dt.with_timezone(&Utc)),
    }
}

async fn find_order<C>(conn: &C, id: Uuid) -> AppResult<OrderModel>
where
    C: ConnectionTrait,
{
    Orders::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::OrderNotFound)
}

async fn load_items<C>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>>
where
    C: ConnectionTrait,
{
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect())
}

fn with_items(order: OrderModel, items: Vec<OrderItem>) -> AppResult<OrderWithItems> {
    let state = fulfilment_of(&order).state();
    Ok(OrderWithItems {
        order: Order::try_from(order)?,
        state,
        items,
    })
}
