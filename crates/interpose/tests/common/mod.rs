//! Shared surfaces and interceptors for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use interpose::{Interceptor, Invocation, Outcome, Signature, surface};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: u64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub order_id: u64,
    pub charged: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    Declined { reason: String },
    InvalidAmount(i64),
}

#[surface]
pub trait OrderService {
    fn charge(&self, order: Order) -> Result<Receipt, PaymentError>;
    fn status(&self, order_id: u64) -> String;
}

/// Same operation name and shape as [`OrderService::charge`]
#[surface]
pub trait Billing {
    fn charge(&self, order: Order) -> Result<Receipt, PaymentError>;
}

#[surface]
pub trait Auditable {
    fn audit_id(&self) -> String;
}

/// Charges anything positive below the limit
#[derive(Debug)]
pub struct Payments {
    pub limit: i64,
    pub charges: AtomicU64,
}

impl Payments {
    pub fn new(limit: i64) -> Self {
        Self {
            limit,
            charges: AtomicU64::new(0),
        }
    }
}

impl OrderService for Payments {
    fn charge(&self, order: Order) -> Result<Receipt, PaymentError> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        if order.amount <= 0 {
            return Err(PaymentError::InvalidAmount(order.amount));
        }
        if order.amount > self.limit {
            return Err(PaymentError::Declined {
                reason: format!("{} exceeds limit {}", order.amount, self.limit),
            });
        }
        Ok(Receipt {
            order_id: order.id,
            charged: order.amount,
        })
    }

    fn status(&self, order_id: u64) -> String {
        format!("order {order_id}: open")
    }
}

impl Billing for Payments {
    fn charge(&self, order: Order) -> Result<Receipt, PaymentError> {
        OrderService::charge(self, order)
    }
}

impl Auditable for Payments {
    fn audit_id(&self) -> String {
        "payments-1".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
}

#[surface]
pub trait AccountService {
    fn withdraw(&self, account: Account, amount: i64) -> Result<i64, String>;
    fn balance(&self, account: Account) -> i64;
}

/// Records every intercepted operation under its own tag, then proceeds
#[derive(Debug, Clone)]
pub struct Recorder {
    pub tag: String,
    pub signatures: Vec<Signature>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new(tag: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            tag: tag.to_string(),
            signatures: Vec::new(),
            log: Arc::clone(log),
        }
    }

    pub fn on(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Interceptor for Recorder {
    fn name(&self) -> &str {
        &self.tag
    }

    fn signatures(&self) -> Vec<Signature> {
        self.signatures.clone()
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Outcome {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.tag, invocation.operation().name()));
        invocation.proceed()
    }
}

pub fn charge_signature() -> Signature {
    Signature::new::<dyn OrderService, _, _>("charge", ["Order"])
}
