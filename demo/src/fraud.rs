//! Application-defined interceptor: declines large charges before they reach
//! the order service

use interpose::{
    Interceptor, InterposeError, InterposeResult, Invocation, Outcome, Properties, Signature,
};
use tracing::warn;

use crate::orders::{Order, OrderService, PaymentError, Receipt};

#[derive(Debug)]
pub struct FraudCheck {
    max_amount: i64,
}

impl Default for FraudCheck {
    fn default() -> Self {
        Self { max_amount: 10_000 }
    }
}

impl Interceptor for FraudCheck {
    fn name(&self) -> &str {
        "fraud-check"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new::<dyn OrderService, _, _>("charge", ["Order"])]
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Outcome {
        let suspicious = invocation
            .arguments()
            .get::<Order>(0)
            .filter(|order| order.amount > self.max_amount)
            .cloned();

        match suspicious {
            Some(order) => {
                warn!(order = order.id, amount = order.amount, "Charge declined");
                Outcome::new::<Result<Receipt, PaymentError>>(Err(PaymentError::Declined(
                    format!("{} exceeds the {} limit", order.amount, self.max_amount),
                )))
            }
            None => invocation.proceed(),
        }
    }

    fn set_properties(&mut self, properties: &Properties) -> InterposeResult<()> {
        if let Some(max) = properties.get_i64("max_amount")? {
            if max <= 0 {
                return Err(InterposeError::invalid_property(
                    "max_amount",
                    "must be positive",
                ));
            }
            self.max_amount = max;
        }
        Ok(())
    }
}
