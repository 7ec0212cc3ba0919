//! In-memory order service used by the demo

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use interpose::surface;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: u64,
    pub customer: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub order_id: u64,
    pub charged: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    Declined(String),
    UnknownOrder(u64),
    InvalidAmount(i64),
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declined(reason) => write!(f, "declined: {reason}"),
            Self::UnknownOrder(id) => write!(f, "unknown order {id}"),
            Self::InvalidAmount(amount) => write!(f, "invalid amount {amount}"),
        }
    }
}

impl std::error::Error for PaymentError {}

#[surface]
pub trait OrderService {
    fn charge(&self, order: Order) -> Result<Receipt, PaymentError>;
    fn refund(&self, order_id: u64, amount: i64) -> Result<i64, PaymentError>;
    fn balance(&self, order_id: u64) -> Option<i64>;
}

#[surface]
pub trait Auditable {
    fn audit_id(&self) -> String;
}

#[derive(Debug, Default)]
pub struct InMemoryOrders {
    charged: Mutex<HashMap<u64, i64>>,
}

impl OrderService for InMemoryOrders {
    fn charge(&self, order: Order) -> Result<Receipt, PaymentError> {
        if order.amount <= 0 {
            return Err(PaymentError::InvalidAmount(order.amount));
        }
        let mut charged = self.charged.lock().unwrap_or_else(|e| e.into_inner());
        *charged.entry(order.id).or_default() += order.amount;
        Ok(Receipt {
            order_id: order.id,
            charged: order.amount,
        })
    }

    fn refund(&self, order_id: u64, amount: i64) -> Result<i64, PaymentError> {
        let mut charged = self.charged.lock().unwrap_or_else(|e| e.into_inner());
        let balance = charged
            .get_mut(&order_id)
            .ok_or(PaymentError::UnknownOrder(order_id))?;
        if amount <= 0 || amount > *balance {
            return Err(PaymentError::InvalidAmount(amount));
        }
        *balance -= amount;
        Ok(*balance)
    }

    fn balance(&self, order_id: u64) -> Option<i64> {
        self.charged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&order_id)
            .copied()
    }
}

impl Auditable for InMemoryOrders {
    fn audit_id(&self) -> String {
        "orders-in-memory".to_string()
    }
}
