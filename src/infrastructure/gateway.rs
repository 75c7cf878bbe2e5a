use crate::domain::ids::ExternalRef;
use crate::domain::payment::{Amount, PaymentMethod};
use crate::domain::ports::{GatewayClient, GatewayPaymentObject};
use crate::error::{GymError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stand-in for the real payment gateway's API client.
///
/// Produces deterministic method-specific payment objects keyed by the
/// external reference, and can be switched into a failing mode to exercise
/// the gateway-error path. The production build would replace this with the
/// provider's HTTP client behind the same port.
#[derive(Clone)]
pub struct SimulatedGateway {
    supported: HashSet<PaymentMethod>,
    failing: Arc<AtomicBool>,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self {
            supported: HashSet::from([
                PaymentMethod::Invoice,
                PaymentMethod::VirtualAccount,
                PaymentMethod::Qris,
                PaymentMethod::Ewallet,
            ]),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that only handles the given methods.
    pub fn with_methods(methods: impl IntoIterator<Item = PaymentMethod>) -> Self {
        Self {
            supported: methods.into_iter().collect(),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flips the outage switch; while set, every payment-object creation
    /// fails. Clones share the switch.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl GatewayClient for SimulatedGateway {
    fn supports(&self, method: PaymentMethod) -> bool {
        self.supported.contains(&method)
    }

    async fn create_payment_object(
        &self,
        external_ref: &ExternalRef,
        method: PaymentMethod,
        _amount: Amount,
    ) -> Result<GatewayPaymentObject> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GymError::Gateway("simulated gateway outage".to_string()));
        }
        if !self.supports(method) {
            return Err(GymError::UnsupportedMethod(method));
        }

        let object = match method {
            PaymentMethod::Invoice => GatewayPaymentObject::Invoice {
                invoice_url: format!("https://pay.example.com/invoice/{external_ref}"),
            },
            PaymentMethod::VirtualAccount => GatewayPaymentObject::VirtualAccount {
                bank: "BCA".to_string(),
                account_number: format!("88-{external_ref}"),
            },
            PaymentMethod::Qris => GatewayPaymentObject::Qris {
                qr_string: format!("qris:{external_ref}"),
            },
            PaymentMethod::Ewallet => GatewayPaymentObject::Ewallet {
                checkout_url: format!("https://pay.example.com/wallet/{external_ref}"),
            },
        };
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_payment_objects_are_method_specific() {
        let gateway = SimulatedGateway::new();
        let external_ref = ExternalRef::new("gym-1");
        let amount = Amount::new(rust_decimal_macros::dec!(100.0)).unwrap();

        let invoice = gateway
            .create_payment_object(&external_ref, PaymentMethod::Invoice, amount)
            .await
            .unwrap();
        assert!(matches!(invoice, GatewayPaymentObject::Invoice { .. }));

        let qris = gateway
            .create_payment_object(&external_ref, PaymentMethod::Qris, amount)
            .await
            .unwrap();
        assert!(matches!(qris, GatewayPaymentObject::Qris { .. }));
    }

    #[tokio::test]
    async fn test_outage_switch_shared_across_clones() {
        let gateway = SimulatedGateway::new();
        let handle = gateway.clone();
        handle.set_failing(true);

        let err = gateway
            .create_payment_object(
                &ExternalRef::new("gym-1"),
                PaymentMethod::Invoice,
                Amount::new(rust_decimal_macros::dec!(1.0)).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::Gateway(_)));
    }

    #[test]
    fn test_restricted_method_set() {
        let gateway = SimulatedGateway::with_methods([PaymentMethod::Invoice]);
        assert!(gateway.supports(PaymentMethod::Invoice));
        assert!(!gateway.supports(PaymentMethod::Qris));
    }
}
