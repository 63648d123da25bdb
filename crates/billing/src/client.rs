//! Stripe API client

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use elevate_shared::LegacyAddress;
use stripe::{
    Address, Client, CreateCustomer, CreatePrice, CreatePriceProductData, CreatePriceRecurring,
    CreatePriceRecurringInterval, CreateSubscription, CreateSubscriptionItems, Currency, Customer,
    CustomerId, CustomerSearchParams, Price, PriceId, StripeError, Subscription, UpdateCustomer,
};
use stripe::generated::billing::subscription::SubscriptionProrationBehavior;
use tokio::sync::{Mutex, OnceCell};

use crate::error::{BillingError, BillingResult, GatewayError};
use crate::gateway::{
    BillingGateway, LineItem, NewCustomer, RecurringBillingRequest, RemoteCustomer,
    RemoteSubscription,
};
use crate::metadata::Metadata;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Stripe configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Base URL of the Stripe API, without trailing slash
    pub api_base: String,
    /// Upper bound for each request, connect through body
    pub request_timeout: Duration,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| BillingError::Config("STRIPE_SECRET_KEY not set".to_string()))?;

        let api_base = std::env::var("STRIPE_API_BASE")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let timeout_secs = match std::env::var("STRIPE_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                BillingError::Config(format!("STRIPE_REQUEST_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            secret_key,
            api_base,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Stripe prices are reusable, so one is created per distinct line item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PriceKey {
    name: String,
    amount_minor_units: i64,
    currency: String,
}

impl From<&LineItem> for PriceKey {
    fn from(item: &LineItem) -> Self {
        Self {
            name: item.name.clone(),
            amount_minor_units: item.amount_minor_units,
            currency: item.currency.clone(),
        }
    }
}

/// Stripe client wrapper
#[derive(Clone)]
pub struct StripeClient {
    inner: Client,
    config: Arc<StripeConfig>,
    /// One cell per line item; the map lock is never held across a request
    prices: Arc<Mutex<HashMap<PriceKey, Arc<OnceCell<PriceId>>>>>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> BillingResult<Self> {
        // Client::from_url panics on an unparseable base
        url::Url::parse(&config.api_base).map_err(|e| {
            BillingError::Config(format!("Invalid STRIPE_API_BASE '{}': {}", config.api_base, e))
        })?;

        let inner = Client::from_url(config.api_base.as_str(), config.secret_key.clone());

        Ok(Self {
            inner,
            config: Arc::new(config),
            prices: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Create a new Stripe client from environment variables
    pub fn from_env() -> BillingResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    /// Get the inner Stripe client
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Run one Stripe call under the configured timeout
    async fn send<T, F>(&self, operation: &'static str, request: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, StripeError>>,
    {
        match tokio::time::timeout(self.config.request_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let error = GatewayError::from(e);
                tracing::error!(operation, error = %error, "Stripe API request failed");
                Err(error)
            }
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = self.config.request_timeout.as_millis() as u64,
                    "Stripe API request timed out"
                );
                Err(GatewayError::Timeout)
            }
        }
    }

    /// Find or create the price backing a line item
    async fn price_for(&self, item: &LineItem) -> Result<PriceId, GatewayError> {
        let cell = {
            let mut prices = self.prices.lock().await;
            Arc::clone(prices.entry(PriceKey::from(item)).or_default())
        };

        // A failed create leaves the cell empty so the next record retries
        let price_id = cell.get_or_try_init(|| self.create_price(item)).await?;
        Ok(price_id.clone())
    }

    async fn create_price(&self, item: &LineItem) -> Result<PriceId, GatewayError> {
        let currency = item.currency.parse::<Currency>().map_err(|_| {
            GatewayError::InvalidRequest(format!("Unsupported currency '{}'", item.currency))
        })?;

        let mut params = CreatePrice::new(currency);
        params.unit_amount = Some(item.amount_minor_units);
        params.recurring = Some(CreatePriceRecurring {
            interval: CreatePriceRecurringInterval::Month,
            interval_count: None,
            aggregate_usage: None,
            trial_period_days: None,
            usage_type: None,
        });
        params.product_data = Some(CreatePriceProductData {
            name: item.name.clone(),
            ..Default::default()
        });

        let price = self
            .send("create_price", Price::create(&self.inner, params))
            .await?;

        tracing::info!(
            price_id = %price.id,
            name = %item.name,
            amount = item.amount_minor_units,
            "Created Stripe price for migrated plan"
        );

        Ok(price.id)
    }
}

/// Escape a value for Stripe's search query language
fn search_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn to_stripe_address(address: &LegacyAddress) -> Option<Address> {
    if address.is_empty() {
        return None;
    }

    let field = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Some(Address {
        line1: field(&address.line1),
        line2: None,
        city: field(&address.city),
        state: field(&address.state),
        postal_code: field(&address.postal_code),
        country: field(&address.country),
    })
}

#[async_trait]
impl BillingGateway for StripeClient {
    async fn search_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<RemoteCustomer>, GatewayError> {
        let params = CustomerSearchParams {
            query: format!("email:'{}'", search_literal(email)),
            limit: Some(1),
            ..Default::default()
        };

        let result = self
            .send("search_customers", Customer::search(&self.inner, params))
            .await?;

        Ok(result
            .data
            .into_iter()
            .next()
            .map(|c| RemoteCustomer { id: c.id }))
    }

    async fn create_customer(
        &self,
        customer: &NewCustomer,
    ) -> Result<RemoteCustomer, GatewayError> {
        customer.metadata.validate()?;

        let params = CreateCustomer {
            email: Some(customer.email.as_str()),
            name: non_blank(customer.name.as_deref()),
            phone: non_blank(customer.phone.as_deref()),
            address: customer.address.as_ref().and_then(to_stripe_address),
            metadata: Some(customer.metadata.to_stripe()),
            ..Default::default()
        };

        let created = self
            .send("create_customer", Customer::create(&self.inner, params))
            .await?;

        Ok(RemoteCustomer { id: created.id })
    }

    async fn create_recurring_billing(
        &self,
        request: &RecurringBillingRequest,
    ) -> Result<RemoteSubscription, GatewayError> {
        request.metadata.validate()?;

        let price_id = self.price_for(&request.line_item).await?;

        let mut params = CreateSubscription::new(request.customer_id.clone());
        params.items = Some(vec![CreateSubscriptionItems {
            price: Some(price_id.to_string()),
            quantity: Some(1),
            ..Default::default()
        }]);
        params.billing_cycle_anchor = request.billing_cycle_anchor;
        if request.suppress_proration {
            params.proration_behavior = Some(SubscriptionProrationBehavior::None);
        }
        params.metadata = Some(request.metadata.to_stripe());

        let subscription = self
            .send("create_subscription", Subscription::create(&self.inner, params))
            .await?;

        Ok(RemoteSubscription {
            id: subscription.id,
        })
    }

    async fn update_customer_metadata(
        &self,
        customer_id: &CustomerId,
        metadata: &Metadata,
    ) -> Result<RemoteCustomer, GatewayError> {
        metadata.validate()?;

        let params = UpdateCustomer {
            metadata: Some(metadata.to_stripe()),
            ..Default::default()
        };

        let updated = self
            .send(
                "update_customer",
                Customer::update(&self.inner, customer_id, params),
            )
            .await?;

        Ok(RemoteCustomer { id: updated.id })
    }
}
