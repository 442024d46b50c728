use std::{fmt::Debug, future::Future, time::Duration};

use log::*;

use crate::{
    db_types::{GatewayProvider, NewPayment, Order, OrderId, OutcomeSource, Payment, PaymentOutcome, PaymentStatus},
    events::{EventProducers, PaymentFailedEvent, PaymentSucceededEvent, SettlementNotice},
    gateways::GatewayRegistry,
    helpers::{validate_amount, validate_payer, validate_reference, ValidationError, WebhookVerifier},
    mpe_api::{
        errors::PaymentFlowError,
        payment_objects::{InitiatePaymentRequest, PaymentKey, PaymentSession, ReconcileResult},
        reconciliation_guard::ReconciliationGuard,
    },
    traits::{GatewayError, GatewayRequest, PaymentGateway, PaymentStore, TransitionResult},
};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// `PaymentFlowApi` orchestrates payment attempts: it starts them with a provider, feeds every observed outcome
/// (client polls, webhooks, provider callbacks and the background sweep) through one reconciliation path, and handles
/// cancellation.
///
/// Every status change after a payment has been reserved goes through the [`ReconciliationGuard`], so racing callers
/// resolve to a single winner. Only the winner publishes the success or failure event.
///
/// Every provider call is bounded by the gateway timeout. A timed-out call is reported as a retryable
/// [`PaymentFlowError::Gateway`] error, and never interpreted as an outcome.
pub struct PaymentFlowApi<B, G> {
    db: B,
    guard: ReconciliationGuard<B>,
    gateways: GatewayRegistry<G>,
    producers: EventProducers,
    gateway_timeout: Duration,
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: PaymentStore,
    G: PaymentGateway,
{
    pub fn new(db: B, gateways: GatewayRegistry<G>, producers: EventProducers) -> Self {
        let guard = ReconciliationGuard::new(db.clone());
        Self { db, guard, gateways, producers, gateway_timeout: DEFAULT_GATEWAY_TIMEOUT }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateways(&self) -> &GatewayRegistry<G> {
        &self.gateways
    }

    /// Starts a new payment attempt for an order.
    ///
    /// The request is validated before anything else happens. Then a `Pending` payment is reserved (which fails with
    /// [`PaymentFlowError::PaymentInProgress`] if the order already has a live attempt) and handed to the provider. If
    /// the provider accepts it, the payment moves to `Processing` and the order to `PaymentPending`. If the provider
    /// call fails or times out, the reservation is removed, so the call can simply be retried.
    pub async fn initiate_payment(&self, request: InitiatePaymentRequest) -> Result<PaymentSession, PaymentFlowError> {
        let InitiatePaymentRequest { order_id, requester, provider, method, payer, callback_url } = request;
        let method = method.unwrap_or(provider.default_method());
        if !provider.supports(method) {
            let msg = format!("{provider} does not support {method} payments");
            return Err(ValidationError::Unsupported(msg).into());
        }
        let payer = validate_payer(provider, payer)?;
        let gateway = self.gateway(provider)?;
        let order = self.owned_order(&order_id, &requester).await?;
        if order.status.is_terminal() {
            return Err(PaymentFlowError::InvalidOrder { order_id, status: order.status });
        }
        validate_amount(order.total_price)?;

        let new_payment = NewPayment::new(order_id, provider, payer.to_string()).with_method(method);
        let payment = self.db.reserve_payment(new_payment).await?;
        let request = GatewayRequest {
            payment_id: payment.id,
            order_id: payment.order_id.clone(),
            amount: payment.amount,
            method,
            payer,
            callback_url,
        };
        let session = match self.call_gateway(gateway.initialize(&request)).await {
            Ok(session) => session,
            Err(e) => {
                warn!("🔄️ {provider} could not start payment #{} for order {}. {e}", payment.id, payment.order_id);
                self.discard_reservation(&payment).await;
                return Err(e.into());
            },
        };
        if let Err(e) = validate_reference(&session.reference) {
            error!("🔄️ {provider} returned an unusable reference for payment #{}. {e}", payment.id);
            self.discard_reservation(&payment).await;
            self.cancel_at_provider(gateway, &session.reference).await;
            return Err(GatewayError::InvalidPayload(e.to_string()).into());
        }
        let activated = match self.guard.activate(payment.id, &session.reference).await {
            Ok(result) => result,
            Err(e) => {
                error!("🔄️ Could not record reference {} for payment #{}. {e}", session.reference, payment.id);
                self.discard_reservation(&payment).await;
                self.cancel_at_provider(gateway, &session.reference).await;
                return Err(e.into());
            },
        };
        match activated {
            TransitionResult::Applied { payment, order } => {
                info!(
                    "🔄️ Payment #{} for order {} ({}) is processing with {provider} as [{}]",
                    payment.id, order.order_id, payment.amount, session.reference
                );
                Ok(PaymentSession {
                    payment,
                    order,
                    redirect_url: session.redirect_url,
                    instructions: session.instructions,
                })
            },
            TransitionResult::Unchanged { payment, .. } => {
                // Cancelled while the provider call was in flight
                warn!("🔄️ Payment #{} became {} before {provider} accepted it", payment.id, payment.status);
                self.cancel_at_provider(gateway, &session.reference).await;
                Err(PaymentFlowError::NotAllowed(format!(
                    "Payment #{} was {} before the provider accepted it",
                    payment.id, payment.status
                )))
            },
        }
    }

    /// Applies an observed provider outcome to a payment. This is the single entry point for every outcome source.
    ///
    /// * A terminal payment is returned as is. Replays are no-ops, and fire no events.
    /// * A `Pending` outcome changes nothing.
    /// * Otherwise the payment and its order move together, and the caller that wins the write publishes the event.
    pub async fn reconcile(
        &self,
        key: PaymentKey,
        outcome: PaymentOutcome,
        source: OutcomeSource,
    ) -> Result<ReconcileResult, PaymentFlowError> {
        let payment = self.find_payment(&key).await?;
        trace!("🔄️ Reconciling payment {key} ({}) with {outcome} from {source}", payment.status);
        if payment.status.is_terminal() {
            report_late_outcome(&payment, &outcome, source);
            return self.unchanged(&payment).await;
        }
        let Some(result) = self.guard.settle(payment.id, &outcome, source).await? else {
            trace!("🔄️ Payment {key} is still pending according to {source}");
            return self.unchanged(&payment).await;
        };
        match result {
            TransitionResult::Applied { payment, order } => {
                info!("🔄️ Payment #{} for order {} is {} ({source})", payment.id, order.order_id, payment.status);
                self.publish_outcome(&payment, source).await;
                Ok(ReconcileResult::applied(payment, order))
            },
            TransitionResult::Unchanged { payment, order } => {
                report_late_outcome(&payment, &outcome, source);
                Ok(ReconcileResult::unchanged(payment, order))
            },
        }
    }

    /// Asks the provider for the current outcome of the payment, and reconciles it.
    ///
    /// Terminal payments are returned without contacting the provider. Provider errors leave the payment untouched.
    pub async fn refresh_payment(
        &self,
        key: PaymentKey,
        source: OutcomeSource,
    ) -> Result<ReconcileResult, PaymentFlowError> {
        let payment = self.find_payment(&key).await?;
        self.refresh(payment, source).await
    }

    /// The client poll path: verify the payment with the given provider reference.
    pub async fn verify_payment(
        &self,
        provider: GatewayProvider,
        reference: &str,
        requester: &str,
    ) -> Result<ReconcileResult, PaymentFlowError> {
        let payment = self.provider_payment(provider, reference).await?;
        self.owned_order(&payment.order_id, requester).await?;
        self.refresh(payment, OutcomeSource::Poll).await
    }

    /// A provider callback only says "something happened to this reference". The outcome is always re-read from the
    /// provider.
    pub async fn process_callback(
        &self,
        provider: GatewayProvider,
        reference: &str,
    ) -> Result<ReconcileResult, PaymentFlowError> {
        let payment = self.provider_payment(provider, reference).await?;
        self.refresh(payment, OutcomeSource::Callback).await
    }

    /// A settlement pushed by an in-process provider.
    pub async fn process_settlement_notice(
        &self,
        notice: SettlementNotice,
    ) -> Result<ReconcileResult, PaymentFlowError> {
        let payment = self.provider_payment(notice.provider, &notice.reference).await?;
        self.reconcile(PaymentKey::Id(payment.id), notice.outcome, OutcomeSource::Callback).await
    }

    /// Authenticates a raw webhook body against the provider's webhook secret and processes it.
    ///
    /// Nothing is looked up until the signature has been verified.
    pub async fn process_signed_webhook(
        &self,
        provider: GatewayProvider,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<Option<ReconcileResult>, PaymentFlowError> {
        let gateway = self.gateway(provider)?;
        let secret = gateway.webhook_secret().cloned().ok_or_else(|| {
            warn!("🔐️ A webhook arrived for {provider}, but no webhook secret is configured. Dropping it.");
            PaymentFlowError::InvalidSignature
        })?;
        WebhookVerifier::new(secret).verify(payload, signature).map_err(|e| {
            warn!("🔐️ Rejected {provider} webhook. {e}");
            PaymentFlowError::InvalidSignature
        })?;
        self.process_webhook(provider, payload).await
    }

    /// Processes an authenticated webhook body. Events that carry no payment outcome are acknowledged and ignored.
    pub async fn process_webhook(
        &self,
        provider: GatewayProvider,
        payload: &[u8],
    ) -> Result<Option<ReconcileResult>, PaymentFlowError> {
        let gateway = self.gateway(provider)?;
        let notice = gateway.parse_webhook(payload).map_err(|e| match e {
            GatewayError::InvalidPayload(msg) => PaymentFlowError::Validation(ValidationError::InvalidPayload(msg)),
            e => PaymentFlowError::Gateway(e),
        })?;
        let Some(notice) = notice else {
            debug!("🔄️ Ignoring {provider} webhook with no payment outcome");
            return Ok(None);
        };
        validate_reference(&notice.reference)?;
        let payment = self.provider_payment(provider, &notice.reference).await?;
        let result = self.reconcile(PaymentKey::Id(payment.id), notice.outcome, OutcomeSource::Webhook).await?;
        Ok(Some(result))
    }

    /// Cancels a live payment on behalf of the customer who owns the order.
    ///
    /// The provider is probed first. If it has already settled the payment, that outcome is reconciled instead and
    /// the cancellation is refused. Otherwise the payment is cancelled locally and the order returns to `Pending`, so
    /// the customer can try again. The provider is then asked to cancel too, on a best-effort basis.
    pub async fn cancel_payment(
        &self,
        payment_id: i64,
        requester: &str,
    ) -> Result<ReconcileResult, PaymentFlowError> {
        let payment = self.owned_payment(payment_id, requester).await?;
        if payment.status.is_terminal() {
            return Err(PaymentFlowError::NotAllowed(format!(
                "Payment #{payment_id} is already {} and cannot be cancelled",
                payment.status
            )));
        }
        let gateway = self.gateway(payment.gateway_provider)?;
        if let Some(reference) = payment.gateway_reference.as_deref() {
            match self.call_gateway(gateway.check_status(reference)).await {
                Ok(outcome) if outcome.is_settled() => {
                    let settled = self.reconcile(PaymentKey::Id(payment_id), outcome, OutcomeSource::Poll).await?;
                    return Err(PaymentFlowError::NotAllowed(format!(
                        "Payment #{payment_id} has already settled as {}",
                        settled.payment.status
                    )));
                },
                Ok(_) => {},
                Err(e) => debug!("🔄️ Could not probe payment #{payment_id} before cancelling it. {e}"),
            }
        }
        match self.guard.cancel(payment_id).await? {
            TransitionResult::Applied { payment, order } => {
                info!("🔄️ Payment #{payment_id} for order {} cancelled by {requester}", order.order_id);
                if let Some(reference) = payment.gateway_reference.as_deref() {
                    self.cancel_at_provider(gateway, reference).await;
                }
                Ok(ReconcileResult::applied(payment, order))
            },
            TransitionResult::Unchanged { payment, .. } => Err(PaymentFlowError::NotAllowed(format!(
                "Payment #{payment_id} is already {} and cannot be cancelled",
                payment.status
            ))),
        }
    }

    /// Refreshes every payment that has been `Processing` for at least `min_age`. Failures are logged and skipped.
    pub async fn reconcile_stale_payments(
        &self,
        min_age: chrono::Duration,
    ) -> Result<Vec<ReconcileResult>, PaymentFlowError> {
        let stale = self.db.fetch_stale_payments(min_age).await?;
        if stale.is_empty() {
            return Ok(Vec::new());
        }
        debug!("🕰️ {} payments have been processing for more than {}s", stale.len(), min_age.num_seconds());
        let mut results = Vec::with_capacity(stale.len());
        for payment in stale {
            let id = payment.id;
            match self.refresh(payment, OutcomeSource::Background).await {
                Ok(result) => results.push(result),
                Err(e) => warn!("🕰️ Could not refresh payment #{id}. It stays as it is. {e}"),
            }
        }
        Ok(results)
    }

    pub async fn payment_by_id(&self, payment_id: i64, requester: &str) -> Result<Payment, PaymentFlowError> {
        self.owned_payment(payment_id, requester).await
    }

    pub async fn payment_by_reference(&self, reference: &str, requester: &str) -> Result<Payment, PaymentFlowError> {
        validate_reference(reference)?;
        let payment = self.find_payment(&PaymentKey::Reference(reference.to_string())).await?;
        self.owned_order(&payment.order_id, requester).await?;
        Ok(payment)
    }

    pub async fn payments_for_order(
        &self,
        order_id: &OrderId,
        requester: &str,
    ) -> Result<Vec<Payment>, PaymentFlowError> {
        self.owned_order(order_id, requester).await?;
        let payments = self.db.fetch_payments_for_order(order_id).await?;
        Ok(payments)
    }

    //------------------------------------------   Private helpers   -------------------------------------------------

    fn gateway(&self, provider: GatewayProvider) -> Result<&G, PaymentFlowError> {
        self.gateways.get(provider).ok_or(PaymentFlowError::UnsupportedProvider(provider))
    }

    async fn call_gateway<T, F>(&self, call: F) -> Result<T, GatewayError>
    where F: Future<Output = Result<T, GatewayError>> {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
    }

    async fn refresh(&self, payment: Payment, source: OutcomeSource) -> Result<ReconcileResult, PaymentFlowError> {
        if payment.status.is_terminal() {
            return self.unchanged(&payment).await;
        }
        let Some(reference) = payment.gateway_reference.clone() else {
            trace!("🔄️ Payment #{} has not been accepted by its provider yet", payment.id);
            return self.unchanged(&payment).await;
        };
        let gateway = self.gateway(payment.gateway_provider)?;
        let outcome = self.call_gateway(gateway.check_status(&reference)).await.map_err(|e| {
            warn!("🔄️ Could not check the status of payment #{} [{reference}]. {e}", payment.id);
            e
        })?;
        self.reconcile(PaymentKey::Id(payment.id), outcome, source).await
    }

    async fn find_payment(&self, key: &PaymentKey) -> Result<Payment, PaymentFlowError> {
        let payment = match key {
            PaymentKey::Id(id) => self.db.fetch_payment(*id).await?,
            PaymentKey::Reference(reference) => self.db.fetch_payment_by_reference(reference).await?,
        };
        payment.ok_or_else(|| PaymentFlowError::PaymentNotFound(key.to_string()))
    }

    async fn provider_payment(&self, provider: GatewayProvider, reference: &str) -> Result<Payment, PaymentFlowError> {
        validate_reference(reference)?;
        let payment = self.find_payment(&PaymentKey::Reference(reference.to_string())).await?;
        if payment.gateway_provider == provider {
            Ok(payment)
        } else {
            warn!("🔄️ {provider} referred to [{reference}], which belongs to {}", payment.gateway_provider);
            Err(PaymentFlowError::PaymentNotFound(format!("[{reference}]")))
        }
    }

    /// Orders that belong to someone else are reported as missing.
    async fn owned_order(&self, order_id: &OrderId, requester: &str) -> Result<Order, PaymentFlowError> {
        match self.db.fetch_order_by_order_id(order_id).await? {
            Some(order) if order.customer_id == requester => Ok(order),
            Some(_) => {
                debug!("🔄️ {requester} asked for order {order_id}, which belongs to someone else");
                Err(PaymentFlowError::OrderNotFound(order_id.clone()))
            },
            None => Err(PaymentFlowError::OrderNotFound(order_id.clone())),
        }
    }

    async fn owned_payment(&self, payment_id: i64, requester: &str) -> Result<Payment, PaymentFlowError> {
        let payment = self.find_payment(&PaymentKey::Id(payment_id)).await?;
        self.owned_order(&payment.order_id, requester)
            .await
            .map_err(|_| PaymentFlowError::PaymentNotFound(PaymentKey::Id(payment_id).to_string()))?;
        Ok(payment)
    }

    /// The current state of a payment this caller did not change. Payment and order come from one snapshot, so a
    /// transition committed by someone else in the meantime shows up in both or in neither.
    async fn unchanged(&self, payment: &Payment) -> Result<ReconcileResult, PaymentFlowError> {
        let (payment, order) = self
            .db
            .fetch_payment_and_order(payment.id)
            .await?
            .ok_or_else(|| PaymentFlowError::PaymentNotFound(PaymentKey::Id(payment.id).to_string()))?;
        Ok(ReconcileResult::unchanged(payment, order))
    }

    async fn discard_reservation(&self, payment: &Payment) {
        match self.db.discard_reservation(payment.id).await {
            Ok(true) => trace!("🔄️ Reservation #{} rolled back", payment.id),
            Ok(false) => warn!("🔄️ Reservation #{} had already moved on and was not rolled back", payment.id),
            Err(e) => error!(
                "🔄️ Could not roll back reservation #{}. Order {} may be blocked. {e}",
                payment.id, payment.order_id
            ),
        }
    }

    async fn cancel_at_provider(&self, gateway: &G, reference: &str) {
        match self.call_gateway(gateway.cancel(reference)).await {
            Ok(()) => debug!("🔄️ {} cancelled [{reference}]", gateway.provider()),
            Err(GatewayError::AlreadySettled(_)) => error!(
                "🔄️ {} had already settled [{reference}] when it was cancelled. The payment needs manual review.",
                gateway.provider()
            ),
            Err(e) => warn!("🔄️ {} could not cancel [{reference}]. {e}", gateway.provider()),
        }
    }

    async fn publish_outcome(&self, payment: &Payment, source: OutcomeSource) {
        match payment.status {
            PaymentStatus::Success => {
                for emitter in &self.producers.payment_succeeded_producer {
                    debug!("🔄️📬️ Notifying payment succeeded hook subscribers");
                    emitter.publish_event(PaymentSucceededEvent::new(payment, source)).await;
                }
            },
            PaymentStatus::Failed => {
                for emitter in &self.producers.payment_failed_producer {
                    debug!("🔄️📬️ Notifying payment failed hook subscribers");
                    emitter.publish_event(PaymentFailedEvent::new(payment, source)).await;
                }
            },
            _ => {},
        }
    }
}

fn report_late_outcome(payment: &Payment, outcome: &PaymentOutcome, source: OutcomeSource) {
    match (payment.status, outcome) {
        (PaymentStatus::Cancelled, PaymentOutcome::Success) => error!(
            "🔄️ Payment #{} for order {} was cancelled, but {source} reports that the provider collected {}. The \
             payment needs manual review and a refund.",
            payment.id, payment.order_id, payment.amount
        ),
        (PaymentStatus::Success, PaymentOutcome::Failed(_)) | (PaymentStatus::Failed, PaymentOutcome::Success) => {
            warn!(
                "🔄️ Payment #{} is {}, but {source} now reports {outcome}. The stored outcome stands.",
                payment.id, payment.status
            )
        },
        _ => trace!("🔄️ Payment #{} is already {}. Ignoring {outcome} from {source}.", payment.id, payment.status),
    }
}
