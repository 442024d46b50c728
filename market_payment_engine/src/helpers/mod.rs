mod validation;
mod webhook_signature;

pub use validation::{
    normalize_phone_number,
    validate_amount,
    validate_currency,
    validate_email,
    validate_order_id,
    validate_payer,
    validate_reference,
    ValidationError,
    MAX_ORDER_ID_LENGTH,
    MAX_REFERENCE_LENGTH,
    MOBILE_MONEY_PREFIXES,
};
pub use webhook_signature::{WebhookSignatureError, WebhookVerifier, CHECKOUT_SIGNATURE_HEADER};
