//! Payment gateway stand-in
//!
//! Issues intent ids and client secrets shaped like a card processor's and reports an intent as
//! paid once it has been settled, either automatically or through [`MockPaymentGateway::settle`].

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use crate::domain::value_objects::Money;
use crate::ports::{PaymentConfirmation, PaymentError, PaymentGateway, PaymentIntent};

#[derive(Debug, Clone)]
struct IntentRecord {
    amount: Money,
    currency: String,
    paid: bool,
}

#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    intents: RwLock<HashMap<String, IntentRecord>>,
    auto_settle: bool,
    fail_on_create: RwLock<bool>,
}

impl MockPaymentGateway {
    /// With `auto_settle`, every intent is paid as soon as it is created.
    pub fn new(auto_settle: bool) -> Self {
        Self { auto_settle, ..Self::default() }
    }

    pub async fn settle(&self, intent_id: &str) -> Result<(), PaymentError> {
        let mut intents = self.intents.write().await;
        let intent = intents.get_mut(intent_id).ok_or_else(|| PaymentError::UnknownIntent(intent_id.to_string()))?;
        intent.paid = true;
        Ok(())
    }

    pub async fn set_fail_on_create(&self, fail: bool) {
        *self.fail_on_create.write().await = fail;
    }

    /// Amount and currency an intent was created for.
    pub async fn amount_of(&self, intent_id: &str) -> Option<(Money, String)> {
        self.intents.read().await.get(intent_id).map(|i| (i.amount, i.currency.clone()))
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_intent(&self, amount: Money, currency: &str, metadata: HashMap<String, String>) -> Result<PaymentIntent, PaymentError> {
        if *self.fail_on_create.read().await {
            return Err(PaymentError::Gateway("intent creation refused".to_string()));
        }
        let intent_id = format!("pi_{}", Uuid::new_v4().simple());
        let client_secret = format!("{intent_id}_secret_{}", Uuid::new_v4().simple());
        tracing::debug!(%intent_id, %amount, currency, ?metadata, "payment intent created");
        self.intents.write().await.insert(
            intent_id.clone(),
            IntentRecord { amount, currency: currency.to_string(), paid: self.auto_settle },
        );
        Ok(PaymentIntent { intent_id, client_secret, amount })
    }

    async fn confirm(&self, intent_id: &str) -> Result<PaymentConfirmation, PaymentError> {
        let intents = self.intents.read().await;
        let intent = intents.get(intent_id).ok_or_else(|| PaymentError::UnknownIntent(intent_id.to_string()))?;
        Ok(PaymentConfirmation { paid: intent.paid, amount: intent.amount })
    }
}
