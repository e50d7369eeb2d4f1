pub mod assembler;
pub mod payment;
pub mod settlement;

pub use assembler::{LineSnapshot, OrderDraft, assemble_order};
pub use payment::{CaptureRequest, PaymentProvider};
pub use settlement::{Fulfilment, OrderState};
