use crate::domain::command::{Command, CommandType};
use crate::domain::garment::{Garment, GarmentId, GarmentService, ServiceEdit, ServiceId};
use crate::domain::money::Cents;
use crate::domain::order::{Client, Order, OrderId};
use crate::domain::payment::{Payment, PaymentId, PaymentMethod, PaymentStatus, RefundKind};
use crate::domain::ports::{OrderStoreBox, PaymentGatewayBox, PaymentStoreBox};
use crate::error::{LedgerError, Result};

/// How many times a new payment change reloads after losing a compare-and-swap.
const MAX_CAS_ATTEMPTS: usize = 8;
/// Settling or voiding a reservation records something that already happened
/// at the gateway, so it keeps retrying until it lands.
const UNTIL_APPLIED: usize = usize::MAX;

/// Final state of the shop after a batch of commands.
#[derive(Debug, Default)]
pub struct ShopState {
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
}

/// The main entry point for shop operations.
///
/// `ShopEngine` owns the stores and the gateway and runs every operation as
/// an awaited sequence of calls. Payment updates go through the store's
/// compare-and-swap so that concurrent refunds cannot both spend the same
/// remaining balance. The engine is `Send + Sync` and can be shared behind
/// an `Arc`.
pub struct ShopEngine {
    orders: OrderStoreBox,
    payments: PaymentStoreBox,
    gateway: PaymentGatewayBox,
}

impl ShopEngine {
    /// Creates a new `ShopEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `orders` - The store for orders, garments and their history.
    /// * `payments` - The store for payments and refunds.
    /// * `gateway` - The card processor.
    pub fn new(orders: OrderStoreBox, payments: PaymentStoreBox, gateway: PaymentGatewayBox) -> Self {
        Self {
            orders,
            payments,
            gateway,
        }
    }

    /// Applies one command row.
    pub async fn process_command(&self, cmd: Command) -> Result<()> {
        match cmd.r#type {
            CommandType::OpenOrder => {
                let client = Client::new(cmd.name()?, None)?;
                self.open_order(cmd.order()?, client).await?;
            }
            CommandType::AddGarment => {
                let description = cmd.name.clone().unwrap_or_default();
                self.add_garment(cmd.order()?, cmd.garment()?, description)
                    .await?;
            }
            CommandType::AddService => {
                let service = GarmentService::new(
                    cmd.service()?,
                    cmd.name.clone().unwrap_or_default(),
                    cmd.quantity.unwrap_or(1),
                    Cents::try_from(cmd.amount()?)?,
                )?;
                self.add_service(cmd.order()?, cmd.garment()?, service)
                    .await?;
            }
            CommandType::UpdateService => {
                let edit = ServiceEdit {
                    quantity: cmd.quantity,
                    unit_price: cmd.amount.map(Cents::try_from).transpose()?,
                };
                self.update_service(
                    cmd.order()?,
                    cmd.garment()?,
                    cmd.service()?,
                    edit,
                    cmd.force.unwrap_or(false),
                    cmd.reason.clone(),
                )
                .await?;
            }
            CommandType::RemoveService => {
                self.remove_service(cmd.order()?, cmd.garment()?, cmd.service()?, cmd.reason()?)
                    .await?;
            }
            CommandType::RestoreService => {
                self.restore_service(cmd.order()?, cmd.garment()?, cmd.service()?)
                    .await?;
            }
            CommandType::CompleteService | CommandType::ReopenService => {
                let done = cmd.r#type == CommandType::CompleteService;
                self.set_service_done(cmd.order()?, cmd.garment()?, cmd.service()?, done)
                    .await?;
            }
            CommandType::Charge => {
                let amount = Cents::try_from(cmd.amount()?)?;
                self.collect_payment(cmd.order()?, cmd.payment()?, amount, cmd.method()?)
                    .await?;
            }
            CommandType::Confirm => {
                self.confirm_payment(cmd.payment()?).await?;
            }
            CommandType::Cancel => {
                self.cancel_payment(cmd.payment()?).await?;
            }
            CommandType::Refund => {
                let requested = cmd.amount.map(Cents::try_from).transpose()?;
                self.refund_payment(cmd.payment()?, requested).await?;
            }
            CommandType::ManualRefund => {
                let amount = Cents::try_from(cmd.amount()?)?;
                self.manual_refund(cmd.payment()?, amount, cmd.reason()?)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn open_order(&self, id: OrderId, client: Client) -> Result<Order> {
        if self.orders.get(id).await?.is_some() {
            return Err(LedgerError::Duplicate(format!("order {}", id)));
        }
        let order = Order::new(id, client);
        self.orders.store(order.clone()).await?;
        tracing::info!(order = id, client = %order.client.name, "order opened");
        Ok(order)
    }

    pub async fn add_garment(&self, order: OrderId, garment: GarmentId, description: String) -> Result<()> {
        self.modify_order(order, |o| o.add_garment(Garment::new(garment, description)))
            .await
    }

    pub async fn add_service(&self, order: OrderId, garment: GarmentId, service: GarmentService) -> Result<()> {
        self.modify_order(order, |o| o.garment_mut(garment)?.add_service(service))
            .await
    }

    pub async fn update_service(
        &self,
        order: OrderId,
        garment: GarmentId,
        service: ServiceId,
        edit: ServiceEdit,
        force: bool,
        reason: Option<String>,
    ) -> Result<()> {
        if edit == ServiceEdit::default() {
            return Err(LedgerError::validation("Nothing to update"));
        }
        self.modify_order(order, |o| {
            o.garment_mut(garment)?
                .update_service(service, edit, force, reason)
        })
        .await
    }

    pub async fn remove_service(
        &self,
        order: OrderId,
        garment: GarmentId,
        service: ServiceId,
        reason: &str,
    ) -> Result<()> {
        self.modify_order(order, |o| o.garment_mut(garment)?.remove_service(service, reason))
            .await
    }

    pub async fn restore_service(&self, order: OrderId, garment: GarmentId, service: ServiceId) -> Result<()> {
        self.modify_order(order, |o| o.garment_mut(garment)?.restore_service(service))
            .await
    }

    pub async fn set_service_done(
        &self,
        order: OrderId,
        garment: GarmentId,
        service: ServiceId,
        done: bool,
    ) -> Result<()> {
        self.modify_order(order, |o| {
            o.garment_mut(garment)?.set_service_done(service, done)
        })
        .await
    }

    /// Records a payment for an order and collects it.
    ///
    /// Card payments are charged through the gateway, cash completes on the
    /// spot, and external POS payments stay pending until confirmed.
    pub async fn collect_payment(
        &self,
        order: OrderId,
        id: PaymentId,
        amount: Cents,
        method: PaymentMethod,
    ) -> Result<Payment> {
        self.load_order(order).await?;
        let payment = Payment::new(id, order, amount, method)?;
        self.payments.insert(payment.clone()).await?;

        match method {
            PaymentMethod::Card => match self.gateway.charge(id, amount, method).await {
                Ok(reference) => {
                    let recorded = self
                        .update_payment(id, MAX_CAS_ATTEMPTS, |p| {
                            p.complete(Some(reference.clone()))
                        })
                        .await;
                    let payment = match recorded {
                        Ok((payment, ())) => payment,
                        Err(e) => {
                            // The payment stays pending; release the money it never recorded.
                            tracing::warn!(payment = id, error = %e, "voiding unrecorded card charge");
                            if let Err(cancel) = self.gateway.cancel(&reference).await {
                                tracing::error!(payment = id, %reference, error = %cancel, "charge could not be voided");
                            }
                            return Err(e);
                        }
                    };
                    self.on_completed(&payment).await?;
                    Ok(payment)
                }
                Err(e) => {
                    tracing::warn!(payment = id, error = %e, "card charge failed");
                    self.update_payment(id, MAX_CAS_ATTEMPTS, Payment::fail).await?;
                    Err(e)
                }
            },
            PaymentMethod::Cash => {
                let (payment, ()) = self
                    .update_payment(id, MAX_CAS_ATTEMPTS, |p| p.complete(None))
                    .await?;
                self.on_completed(&payment).await?;
                Ok(payment)
            }
            PaymentMethod::ExternalPos => {
                tracing::info!(payment = id, %amount, "awaiting terminal confirmation");
                Ok(payment)
            }
        }
    }

    /// Marks a pending payment as approved.
    pub async fn confirm_payment(&self, id: PaymentId) -> Result<Payment> {
        let (payment, ()) = self
            .update_payment(id, MAX_CAS_ATTEMPTS, |p| p.complete(None))
            .await?;
        self.on_completed(&payment).await?;
        Ok(payment)
    }

    /// Cancels a pending payment.
    pub async fn cancel_payment(&self, id: PaymentId) -> Result<Payment> {
        let payment = self.load_payment(id).await?;
        if payment.status != PaymentStatus::Pending {
            return Err(LedgerError::validation(format!(
                "Payment {} is {}; only pending payments can be cancelled",
                id,
                payment.status.as_str()
            )));
        }
        let (payment, ()) = self
            .update_payment(id, MAX_CAS_ATTEMPTS, Payment::fail)
            .await?;
        tracing::info!(payment = id, "payment cancelled");
        Ok(payment)
    }

    /// Refunds a card payment through the gateway.
    ///
    /// With no amount, the whole remaining balance is refunded. The amount
    /// is reserved in the ledger before the gateway is called and voided
    /// again if the gateway refuses.
    pub async fn refund_payment(&self, id: PaymentId, requested: Option<Cents>) -> Result<Payment> {
        let payment = self.load_payment(id).await?;
        if !payment.method.uses_gateway() {
            return Err(LedgerError::validation(format!(
                "Payment {} was paid by {}; record a manual refund instead",
                id,
                payment.method.as_str()
            )));
        }
        let reference = payment.gateway_reference.clone().ok_or_else(|| {
            LedgerError::validation(format!("Payment {} has no gateway charge", id))
        })?;
        let amount = requested.unwrap_or_else(|| payment.remaining_refundable());

        let (_, seq) = self
            .update_payment(id, MAX_CAS_ATTEMPTS, |p| {
                p.apply_refund(amount, RefundKind::Gateway { reference: None })
            })
            .await?;

        match self.gateway.refund(&reference, amount).await {
            Ok(refund_reference) => {
                let (payment, ()) = self
                    .update_payment(id, UNTIL_APPLIED, |p| {
                        p.settle_refund(seq, refund_reference.clone())
                    })
                    .await?;
                tracing::info!(
                    payment = id,
                    %amount,
                    status = payment.status.as_str(),
                    "refund issued"
                );
                Ok(payment)
            }
            Err(e) => {
                tracing::warn!(payment = id, %amount, error = %e, "gateway refused refund");
                self.update_payment(id, UNTIL_APPLIED, |p| p.void_refund(seq)).await?;
                Err(e)
            }
        }
    }

    /// Records a refund handed out outside the gateway.
    pub async fn manual_refund(&self, id: PaymentId, amount: Cents, reason: &str) -> Result<Payment> {
        let reason = reason.trim().to_string();
        let (payment, _) = self
            .update_payment(id, MAX_CAS_ATTEMPTS, |p| {
                p.apply_refund(
                    amount,
                    RefundKind::Manual {
                        reason: reason.clone(),
                    },
                )
            })
            .await?;
        tracing::info!(
            payment = id,
            %amount,
            status = payment.status.as_str(),
            "manual refund recorded"
        );
        Ok(payment)
    }

    pub async fn payment(&self, id: PaymentId) -> Result<Payment> {
        self.load_payment(id).await
    }

    pub async fn order(&self, id: OrderId) -> Result<Order> {
        self.load_order(id).await
    }

    /// Consumes the engine and returns every order and payment, sorted by id.
    pub async fn into_results(self) -> Result<ShopState> {
        let mut orders = self.orders.all_orders().await?;
        let mut payments = self.payments.all_payments().await?;
        orders.sort_by_key(|o| o.id);
        payments.sort_by_key(|p| p.id);
        Ok(ShopState { orders, payments })
    }

    async fn on_completed(&self, payment: &Payment) -> Result<()> {
        tracing::info!(payment = payment.id, order = payment.order, "payment completed");
        self.modify_order(payment.order, |o| {
            o.lock_services();
            Ok(())
        })
        .await
    }

    async fn load_order(&self, id: OrderId) -> Result<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("order {}", id)))
    }

    async fn load_payment(&self, id: PaymentId) -> Result<Payment> {
        self.payments
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("payment {}", id)))
    }

    async fn modify_order<F>(&self, id: OrderId, change: F) -> Result<()>
    where
        F: FnOnce(&mut Order) -> Result<()> + Send,
    {
        let mut order = self.load_order(id).await?;
        change(&mut order)?;
        self.orders.store(order).await
    }

    /// Loads a payment, applies `change`, and writes it back with compare-and-swap.
    ///
    /// `change` runs against fresh state on every attempt, so validation
    /// always sees the latest balance. Errors from `change` abort without
    /// writing anything.
    async fn update_payment<F, T>(
        &self,
        id: PaymentId,
        max_attempts: usize,
        mut change: F,
    ) -> Result<(Payment, T)>
    where
        F: FnMut(&mut Payment) -> Result<T> + Send,
        T: Send,
    {
        for attempt in 1..=max_attempts {
            let mut payment = self.load_payment(id).await?;
            let expected = payment.version;
            let output = change(&mut payment)?;
            match self.payments.compare_and_swap(payment.clone(), expected).await {
                Ok(()) => {
                    payment.version = expected + 1;
                    return Ok((payment, output));
                }
                Err(LedgerError::Conflict(reason)) => {
                    tracing::debug!(payment = id, attempt, %reason, "payment changed underneath, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(LedgerError::Conflict(format!(
            "payment {} kept changing after {} attempts",
            id, max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::PaymentStore;
    use crate::infrastructure::gateway::SimulatedGateway;
    use crate::infrastructure::in_memory::{InMemoryOrderStore, InMemoryPaymentStore};
    use rust_decimal_macros::dec;

    fn engine() -> (ShopEngine, SimulatedGateway) {
        let gateway = SimulatedGateway::new().with_decline_above(Cents::new(100_000));
        let engine = ShopEngine::new(
            Box::new(InMemoryOrderStore::new()),
            Box::new(InMemoryPaymentStore::new()),
            Box::new(gateway.clone()),
        );
        (engine, gateway)
    }

    async fn engine_with_order() -> (ShopEngine, SimulatedGateway) {
        let (engine, gateway) = engine();
        engine
            .open_order(1, Client::new("Ada", None).unwrap())
            .await
            .unwrap();
        engine
            .add_garment(1, 1, "wool coat".to_string())
            .await
            .unwrap();
        engine
            .add_service(
                1,
                1,
                GarmentService::new(1, "replace lining".to_string(), 1, Cents::new(5000)).unwrap(),
            )
            .await
            .unwrap();
        (engine, gateway)
    }

    #[tokio::test]
    async fn test_partial_then_full_refund() {
        let (engine, gateway) = engine_with_order().await;
        let payment = engine
            .collect_payment(1, 10, Cents::new(5000), PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.remaining_refundable(), Cents::new(5000));

        let payment = engine
            .refund_payment(10, Some(Cents::new(2000)))
            .await
            .unwrap();
        assert_eq!(payment.remaining_refundable(), Cents::new(3000));
        assert_eq!(payment.status, PaymentStatus::PartiallyRefunded);

        // No amount refunds whatever is left.
        let payment = engine.refund_payment(10, None).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Refunded);
        assert_eq!(payment.refunded_amount, Cents::new(5000));

        let reference = payment.gateway_reference.clone().unwrap();
        assert_eq!(gateway.refunded(&reference).await, Some(Cents::new(5000)));

        assert!(matches!(
            engine.refund_payment(10, None).await,
            Err(LedgerError::ValidationError(_))
        ));
        assert!(matches!(
            engine.manual_refund(10, Cents::new(1), "goodwill").await,
            Err(LedgerError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_refunds_leave_no_trace() {
        let (engine, gateway) = engine_with_order().await;
        engine
            .collect_payment(1, 10, Cents::new(5000), PaymentMethod::Card)
            .await
            .unwrap();
        engine
            .refund_payment(10, Some(Cents::new(3000)))
            .await
            .unwrap();
        let before = engine.payment(10).await.unwrap();

        for requested in [0, -500, 3000] {
            let result = engine.refund_payment(10, Some(Cents::new(requested))).await;
            assert!(matches!(result, Err(LedgerError::ValidationError(_))));
        }

        let after = engine.payment(10).await.unwrap();
        assert_eq!(after, before);
        let reference = after.gateway_reference.unwrap();
        assert_eq!(gateway.refunded(&reference).await, Some(Cents::new(3000)));
    }

    #[tokio::test]
    async fn test_manual_refund_skips_gateway() {
        let (engine, gateway) = engine_with_order().await;
        engine
            .collect_payment(1, 10, Cents::new(5000), PaymentMethod::Card)
            .await
            .unwrap();

        let payment = engine
            .manual_refund(10, Cents::new(1500), "store credit issued")
            .await
            .unwrap();
        assert_eq!(payment.refunded_amount, Cents::new(1500));
        assert_eq!(
            payment.refunds[0].kind,
            RefundKind::Manual {
                reason: "store credit issued".to_string()
            }
        );

        let reference = payment.gateway_reference.unwrap();
        assert_eq!(gateway.refunded(&reference).await, Some(Cents::ZERO));

        assert!(engine.manual_refund(10, Cents::new(100), " ").await.is_err());
    }

    #[tokio::test]
    async fn test_cash_payment_refunds_manually_only() {
        let (engine, _) = engine_with_order().await;
        engine
            .collect_payment(1, 10, Cents::new(2000), PaymentMethod::Cash)
            .await
            .unwrap();

        assert!(matches!(
            engine.refund_payment(10, Some(Cents::new(500))).await,
            Err(LedgerError::ValidationError(_))
        ));
        let payment = engine
            .manual_refund(10, Cents::new(2000), "cash returned at the counter")
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_gateway_failure_voids_reservation() {
        let (engine, gateway) = engine_with_order().await;
        engine
            .collect_payment(1, 10, Cents::new(5000), PaymentMethod::Card)
            .await
            .unwrap();

        gateway.set_refunds_offline(true);
        let result = engine.refund_payment(10, Some(Cents::new(2000))).await;
        assert!(matches!(result, Err(LedgerError::GatewayError(_))));

        let payment = engine.payment(10).await.unwrap();
        assert_eq!(payment.refunded_amount, Cents::ZERO);
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.refunds.len(), 1);
        assert!(payment.refunds[0].voided);

        gateway.set_refunds_offline(false);
        let payment = engine
            .refund_payment(10, Some(Cents::new(2000)))
            .await
            .unwrap();
        assert_eq!(payment.refunded_amount, Cents::new(2000));
        assert_eq!(payment.refunds[1].seq, 1);
    }

    #[tokio::test]
    async fn test_declined_card_is_recorded_as_failed() {
        let (engine, _) = engine_with_order().await;
        let result = engine
            .collect_payment(1, 10, Cents::new(200_000), PaymentMethod::Card)
            .await;
        assert!(matches!(result, Err(LedgerError::GatewayError(_))));

        let payment = engine.payment(10).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(!payment.is_refundable());

        // Nothing was finalized, so services stay editable.
        let order = engine.order(1).await.unwrap();
        assert!(!order.garments[&1].services[0].is_locked);
    }

    #[tokio::test]
    async fn test_external_pos_confirm_and_cancel() {
        let (engine, _) = engine_with_order().await;
        let pending = engine
            .collect_payment(1, 10, Cents::new(1000), PaymentMethod::ExternalPos)
            .await
            .unwrap();
        assert_eq!(pending.status, PaymentStatus::Pending);

        let confirmed = engine.confirm_payment(10).await.unwrap();
        assert_eq!(confirmed.status, PaymentStatus::Completed);
        assert!(engine.cancel_payment(10).await.is_err());

        engine
            .collect_payment(1, 11, Cents::new(1000), PaymentMethod::ExternalPos)
            .await
            .unwrap();
        let cancelled = engine.cancel_payment(11).await.unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Failed);
        assert!(engine.confirm_payment(11).await.is_err());
    }

    #[tokio::test]
    async fn test_completed_payment_locks_services() {
        let (engine, _) = engine_with_order().await;
        engine
            .collect_payment(1, 10, Cents::new(5000), PaymentMethod::Cash)
            .await
            .unwrap();

        let edit = ServiceEdit {
            quantity: None,
            unit_price: Some(Cents::new(6000)),
        };
        assert!(matches!(
            engine.update_service(1, 1, 1, edit, false, None).await,
            Err(LedgerError::ValidationError(_))
        ));
        engine
            .update_service(1, 1, 1, edit, true, Some("extra panel".to_string()))
            .await
            .unwrap();

        let order = engine.order(1).await.unwrap();
        let garment = &order.garments[&1];
        assert!(garment.services[0].is_locked);
        assert_eq!(order.total(), Cents::new(6000));
        assert_eq!(garment.history.last().unwrap().reason.as_deref(), Some("extra panel"));
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_ids() {
        let (engine, _) = engine_with_order().await;
        assert!(matches!(
            engine
                .collect_payment(99, 10, Cents::new(100), PaymentMethod::Cash)
                .await,
            Err(LedgerError::NotFound(_))
        ));
        engine
            .collect_payment(1, 10, Cents::new(100), PaymentMethod::Cash)
            .await
            .unwrap();
        assert!(matches!(
            engine
                .collect_payment(1, 10, Cents::new(100), PaymentMethod::Cash)
                .await,
            Err(LedgerError::Duplicate(_))
        ));
        assert!(matches!(
            engine.open_order(1, Client::new("Ada", None).unwrap()).await,
            Err(LedgerError::Duplicate(_))
        ));
        assert!(matches!(
            engine.refund_payment(42, None).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_process_command_dispatch() {
        let (engine, _) = engine();

        let mut open = Command::new(CommandType::OpenOrder);
        open.order = Some(1);
        open.name = Some("Ada".to_string());
        engine.process_command(open).await.unwrap();

        let mut garment = Command::new(CommandType::AddGarment);
        garment.order = Some(1);
        garment.garment = Some(1);
        engine.process_command(garment).await.unwrap();

        let mut service = Command::new(CommandType::AddService);
        service.order = Some(1);
        service.garment = Some(1);
        service.service = Some(1);
        service.quantity = Some(2);
        service.amount = Some(dec!(12.50));
        engine.process_command(service).await.unwrap();

        let mut charge = Command::new(CommandType::Charge);
        charge.order = Some(1);
        charge.payment = Some(1);
        charge.amount = Some(dec!(25));
        charge.method = Some(PaymentMethod::Card);
        engine.process_command(charge).await.unwrap();

        let mut refund = Command::new(CommandType::Refund);
        refund.payment = Some(1);
        refund.amount = Some(dec!(5.25));
        engine.process_command(refund).await.unwrap();

        // A manual refund without a reason is rejected before touching anything.
        let mut manual = Command::new(CommandType::ManualRefund);
        manual.payment = Some(1);
        manual.amount = Some(dec!(1));
        assert!(engine.process_command(manual).await.is_err());

        let state = engine.into_results().await.unwrap();
        assert_eq!(state.orders[0].total(), Cents::new(2500));
        assert_eq!(state.payments[0].refunded_amount, Cents::new(525));
        assert_eq!(state.orders[0].balance_due(&state.payments), Cents::new(525));
    }

    /// Accepts new payments but refuses every later write.
    struct ReadOnlyAfterInsert(InMemoryPaymentStore);

    #[async_trait::async_trait]
    impl PaymentStore for ReadOnlyAfterInsert {
        async fn insert(&self, payment: Payment) -> Result<()> {
            self.0.insert(payment).await
        }
        async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
            self.0.get(payment_id).await
        }
        async fn compare_and_swap(&self, _payment: Payment, _expected_version: u64) -> Result<()> {
            Err(LedgerError::InternalError("store is read-only".into()))
        }
        async fn all_payments(&self) -> Result<Vec<Payment>> {
            self.0.all_payments().await
        }
    }

    #[tokio::test]
    async fn test_unrecorded_card_charge_is_voided() {
        let gateway = SimulatedGateway::new();
        let engine = ShopEngine::new(
            Box::new(InMemoryOrderStore::new()),
            Box::new(ReadOnlyAfterInsert(InMemoryPaymentStore::new())),
            Box::new(gateway.clone()),
        );
        engine
            .open_order(1, Client::new("Ada", None).unwrap())
            .await
            .unwrap();

        let result = engine
            .collect_payment(1, 1, Cents::new(4000), PaymentMethod::Card)
            .await;

        assert!(matches!(result, Err(LedgerError::InternalError(_))));
        assert_eq!(gateway.captured_charges().await, 0);
        let payment = engine.payment(1).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.gateway_reference, None);
    }
}
