//! In-memory billing gateway for tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use stripe::CustomerId;

use crate::error::GatewayError;
use crate::gateway::{
    BillingGateway, NewCustomer, RecurringBillingRequest, RemoteCustomer, RemoteSubscription,
};
use crate::metadata::Metadata;

#[derive(Debug, Clone)]
pub(crate) struct StoredCustomer {
    pub id: CustomerId,
    pub email: String,
    pub request: NewCustomer,
}

#[derive(Default)]
struct MockState {
    customers: Vec<StoredCustomer>,
    subscriptions: Vec<RecurringBillingRequest>,
    metadata_updates: Vec<(CustomerId, Metadata)>,
    fail_search: HashSet<String>,
    slow_search: HashMap<String, Duration>,
    fail_create: HashSet<String>,
    fail_subscriptions: bool,
    fail_metadata_updates: bool,
}

/// Gateway double with call counters and per-email failure injection
#[derive(Default)]
pub(crate) struct MockGateway {
    state: Mutex<MockState>,
    searches: AtomicUsize,
    customer_creates: AtomicUsize,
    subscription_creates: AtomicUsize,
    metadata_updates: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(self, email: &str, id: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.customers.push(StoredCustomer {
                id: id.parse().unwrap(),
                email: email.to_string(),
                request: NewCustomer {
                    email: email.to_string(),
                    name: None,
                    phone: None,
                    address: None,
                    metadata: Metadata::new(),
                },
            });
        }
        self
    }

    pub fn fail_search_for(self, email: &str) -> Self {
        self.state.lock().unwrap().fail_search.insert(email.to_string());
        self
    }

    /// Hold the lookup for `email` before answering
    pub fn delay_search_for(self, email: &str, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .slow_search
            .insert(email.to_string(), delay);
        self
    }

    pub fn fail_create_for(self, email: &str) -> Self {
        self.state.lock().unwrap().fail_create.insert(email.to_string());
        self
    }

    pub fn fail_subscriptions(self) -> Self {
        self.state.lock().unwrap().fail_subscriptions = true;
        self
    }

    pub fn fail_metadata_updates(self) -> Self {
        self.state.lock().unwrap().fail_metadata_updates = true;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
            + self.customer_creates.load(Ordering::SeqCst)
            + self.subscription_creates.load(Ordering::SeqCst)
            + self.metadata_updates.load(Ordering::SeqCst)
    }

    pub fn customer_create_calls(&self) -> usize {
        self.customer_creates.load(Ordering::SeqCst)
    }

    pub fn subscription_create_calls(&self) -> usize {
        self.subscription_creates.load(Ordering::SeqCst)
    }

    pub fn metadata_update_calls(&self) -> usize {
        self.metadata_updates.load(Ordering::SeqCst)
    }

    pub fn customers(&self) -> Vec<StoredCustomer> {
        self.state.lock().unwrap().customers.clone()
    }

    pub fn subscriptions(&self) -> Vec<RecurringBillingRequest> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn metadata_writes(&self) -> Vec<(CustomerId, Metadata)> {
        self.state.lock().unwrap().metadata_updates.clone()
    }

    fn unavailable() -> GatewayError {
        GatewayError::Transport("connection refused".to_string())
    }
}

#[async_trait]
impl BillingGateway for MockGateway {
    async fn search_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<RemoteCustomer>, GatewayError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().unwrap().slow_search.get(email).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.fail_search.contains(email) {
            return Err(Self::unavailable());
        }
        Ok(state
            .customers
            .iter()
            .find(|c| c.email == email)
            .map(|c| RemoteCustomer { id: c.id.clone() }))
    }

    async fn create_customer(
        &self,
        customer: &NewCustomer,
    ) -> Result<RemoteCustomer, GatewayError> {
        self.customer_creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.fail_create.contains(&customer.email) {
            return Err(GatewayError::Api {
                status: 500,
                message: "Failed to create customer".to_string(),
            });
        }
        customer.metadata.validate()?;

        let id: CustomerId = format!("cus_mock{}", state.customers.len() + 1)
            .parse()
            .unwrap();
        state.customers.push(StoredCustomer {
            id: id.clone(),
            email: customer.email.clone(),
            request: customer.clone(),
        });
        Ok(RemoteCustomer { id })
    }

    async fn create_recurring_billing(
        &self,
        request: &RecurringBillingRequest,
    ) -> Result<RemoteSubscription, GatewayError> {
        self.subscription_creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.fail_subscriptions {
            return Err(GatewayError::Api {
                status: 400,
                message: "billing_cycle_anchor cannot be later than next natural billing date"
                    .to_string(),
            });
        }
        state.subscriptions.push(request.clone());
        let id = format!("sub_mock{}", state.subscriptions.len())
            .parse()
            .unwrap();
        Ok(RemoteSubscription { id })
    }

    async fn update_customer_metadata(
        &self,
        customer_id: &CustomerId,
        metadata: &Metadata,
    ) -> Result<RemoteCustomer, GatewayError> {
        self.metadata_updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.fail_metadata_updates {
            return Err(Self::unavailable());
        }
        metadata.validate()?;
        state
            .metadata_updates
            .push((customer_id.clone(), metadata.clone()));
        Ok(RemoteCustomer {
            id: customer_id.clone(),
        })
    }
}
