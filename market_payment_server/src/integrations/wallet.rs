use std::{future::Future, pin::Pin};

use log::*;
use market_payment_engine::events::{EventHandlers, EventHooks, PaymentFailedEvent, PaymentSucceededEvent};

const EVENT_BUFFER_SIZE: usize = 25;

/// Creates the hooks that hand payment outcomes to the wallet service.
///
/// The engine publishes each outcome exactly once, from whichever caller settled the payment, so the handlers below
/// can act without checking for duplicates.
/// 1. PaymentSucceededEvent - The order's amount is ready to be credited to the seller's wallet.
/// 2. PaymentFailedEvent - Nothing is credited. The buyer may start another payment for the order.
pub fn create_wallet_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_payment_succeeded(|ev| {
        Box::pin(async move { log_credit(ev) }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_payment_failed(|ev| Box::pin(async move { log_failure(ev) }) as Pin<Box<dyn Future<Output = ()> + Send>>);
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}

fn log_credit(ev: PaymentSucceededEvent) {
    let PaymentSucceededEvent { order_id, payment_id, amount, settled_at, source } = ev;
    info!(
        "💰️ Payment #{payment_id} for order {order_id} settled at {settled_at} (via {source}). {amount} is ready to \
         be credited."
    );
}

fn log_failure(ev: PaymentFailedEvent) {
    let PaymentFailedEvent { order_id, payment_id, reason, source, .. } = ev;
    info!("💰️ Payment #{payment_id} for order {order_id} failed (via {source}). {reason}");
}
