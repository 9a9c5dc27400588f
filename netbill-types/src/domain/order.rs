//! Order-side input to payment initiation.

use serde::{Deserialize, Serialize};

use super::money::Money;

/// The slice of an order the payment core needs to start a checkout.
///
/// Orders themselves live with an external collaborator; this carries
/// only what the gateway call requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    /// Collaborator-side order identifier
    pub order_id: String,
    /// Total to collect
    pub amount: Money,
    /// Customer contact handed to the provider checkout page
    pub customer_ref: String,
    pub description: Option<String>,
}

impl PaymentOrder {
    pub fn new(order_id: impl Into<String>, amount: Money, customer_ref: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            amount,
            customer_ref: customer_ref.into(),
            description: None,
        }
    }
}
