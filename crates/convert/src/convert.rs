//! CSV export conversion
//!
//! Folds the legacy platform's customer, subscription and order exports into
//! the record list accepted by the import endpoint.

use std::collections::HashMap;
use std::io::Read;

use anyhow::Context;
use elevate_shared::{LegacyAddress, LegacyCustomerRecord, LegacyOrder, LegacySubscription};

pub const DEFAULT_PLAN_NAME: &str = "Individual Membership";
pub const DEFAULT_COUNTRY: &str = "US";
pub const DEFAULT_ORDER_AMOUNT: &str = "0";
pub const DEFAULT_ORDER_ITEM: &str = "Purchase";

/// One CSV row keyed by header
struct Row {
    fields: HashMap<String, String>,
}

impl Row {
    /// Value of the first alias whose column exists. A present but empty
    /// column wins over later aliases, matching how the exports are read.
    fn first(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .find_map(|alias| self.fields.get(*alias))
            .map(String::as_str)
    }

    fn text(&self, aliases: &[&str]) -> String {
        self.first(aliases).unwrap_or_default().to_string()
    }

    fn text_or(&self, aliases: &[&str], default: &str) -> String {
        self.first(aliases).unwrap_or(default).to_string()
    }

    /// Same as [`Row::text`] but blank values become `None`
    fn optional(&self, aliases: &[&str]) -> Option<String> {
        non_blank(self.text(aliases))
    }

    fn email(&self, aliases: &[&str]) -> String {
        self.first(aliases)
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_default()
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn read_rows<R: Read>(input: R) -> anyhow::Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    // Spreadsheet exports often start with a UTF-8 byte order mark
    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Malformed CSV row {}", line + 2))?;
        let fields = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(Row { fields });
    }
    Ok(rows)
}

/// Totals reported after a conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub total: usize,
    pub with_subscriptions: usize,
    pub with_orders: usize,
}

impl ConversionSummary {
    pub fn of(records: &[LegacyCustomerRecord]) -> Self {
        Self {
            total: records.len(),
            with_subscriptions: records.iter().filter(|r| r.subscription.is_some()).count(),
            with_orders: records.iter().filter(|r| !r.order_history.is_empty()).count(),
        }
    }
}

/// Accumulates customers keyed by normalized email, in first-seen order
#[derive(Debug, Default)]
pub struct Converter {
    customers: Vec<LegacyCustomerRecord>,
    index: HashMap<String, usize>,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the customer export. Returns the number of distinct customers held.
    pub fn load_customers<R: Read>(&mut self, input: R) -> anyhow::Result<usize> {
        for row in read_rows(input)? {
            let email = row.email(&["Email", "email"]);
            if email.is_empty() {
                tracing::debug!("Skipping customer row without email");
                continue;
            }

            let full_name = format!(
                "{} {}",
                row.text(&["First Name"]),
                row.text(&["Last Name"])
            )
            .trim()
            .to_string();
            let name = non_blank(full_name).or_else(|| row.optional(&["Name"]));

            let address = LegacyAddress {
                line1: row.optional(&["Street Address", "Address"]),
                city: row.optional(&["City"]),
                state: row.optional(&["State", "Region"]),
                postal_code: row.optional(&["Zip", "Postal Code"]),
                country: non_blank(row.text_or(&["Country"], DEFAULT_COUNTRY)),
            };

            let record = LegacyCustomerRecord {
                email: email.clone(),
                name,
                phone: row.optional(&["Phone", "phone"]),
                legacy_id: row.optional(&["ID", "Contact ID"]),
                address: (!address.is_empty()).then_some(address),
                subscription: None,
                order_history: Vec::new(),
            };

            match self.index.get(&email) {
                Some(&position) => self.customers[position] = record,
                None => {
                    self.index.insert(email, self.customers.len());
                    self.customers.push(record);
                }
            }
        }

        tracing::info!(customers = self.customers.len(), "Loaded customers");
        Ok(self.customers.len())
    }

    /// Attach active subscriptions to known customers. Returns how many rows applied.
    pub fn load_subscriptions<R: Read>(&mut self, input: R) -> anyhow::Result<usize> {
        let mut applied = 0;
        for row in read_rows(input)? {
            let email = row.email(&["Email", "Member Email"]);
            let Some(&position) = self.index.get(&email) else {
                continue;
            };
            if !row.text(&["Status"]).trim().eq_ignore_ascii_case("active") {
                continue;
            }

            self.customers[position].subscription = Some(LegacySubscription {
                plan_name: row.text_or(&["Plan Name", "Plan"], DEFAULT_PLAN_NAME),
                is_active: true,
                start_date: row.optional(&["Start Date", "Created"]),
                next_renewal_date: row.optional(&["Next Payment Date", "Renewal Date"]),
            });
            applied += 1;
        }

        tracing::info!(applied, "Loaded subscriptions");
        Ok(applied)
    }

    /// Append orders to known customers in file order. Returns how many rows applied.
    pub fn load_orders<R: Read>(&mut self, input: R) -> anyhow::Result<usize> {
        let mut applied = 0;
        for row in read_rows(input)? {
            let email = row.email(&["Email", "Customer Email"]);
            let Some(&position) = self.index.get(&email) else {
                continue;
            };

            self.customers[position].order_history.push(LegacyOrder {
                date: row.text(&["Date", "Order Date"]),
                amount: row.text_or(&["Total", "Amount"], DEFAULT_ORDER_AMOUNT),
                item: row.text_or(&["Items", "Product"], DEFAULT_ORDER_ITEM),
            });
            applied += 1;
        }

        tracing::info!(applied, "Loaded order history");
        Ok(applied)
    }

    pub fn finish(self) -> Vec<LegacyCustomerRecord> {
        self.customers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOMERS: &str = "\u{feff}Email,First Name,Last Name,Phone,ID,Street Address,City,State,Zip,Country\n\
        Jane@Example.com ,Jane,Doe,555-0100,w-1,1 Main St,Springfield,IL,62701,US\n\
        ,No,Email,,,,,,,\n\
        sam@example.com,Sam,,,w-2,,,,,\n";

    fn converter() -> Converter {
        let mut converter = Converter::new();
        converter.load_customers(CUSTOMERS.as_bytes()).unwrap();
        converter
    }

    #[test]
    fn test_customers_are_normalized() {
        let records = converter().finish();
        assert_eq!(records.len(), 2);

        let jane = &records[0];
        assert_eq!(jane.email, "jane@example.com");
        assert_eq!(jane.name.as_deref(), Some("Jane Doe"));
        assert_eq!(jane.phone.as_deref(), Some("555-0100"));
        assert_eq!(jane.legacy_id.as_deref(), Some("w-1"));
        let address = jane.address.as_ref().unwrap();
        assert_eq!(address.postal_code.as_deref(), Some("62701"));

        let sam = &records[1];
        assert_eq!(sam.name.as_deref(), Some("Sam"));
        assert!(sam.phone.is_none());
        assert!(sam.address.is_none());
    }

    #[test]
    fn test_country_defaults_when_column_missing() {
        let mut converter = Converter::new();
        converter
            .load_customers("Email,Name,City\nlee@example.com,Lee Park,Austin\n".as_bytes())
            .unwrap();
        let records = converter.finish();

        assert_eq!(records[0].name.as_deref(), Some("Lee Park"));
        let address = records[0].address.as_ref().unwrap();
        assert_eq!(address.city.as_deref(), Some("Austin"));
        assert_eq!(address.country.as_deref(), Some(DEFAULT_COUNTRY));
    }

    #[test]
    fn test_later_duplicate_replaces_in_place() {
        let mut converter = Converter::new();
        converter
            .load_customers(
                "Email,Name\na@example.com,First\nb@example.com,Bee\nA@EXAMPLE.COM,Second\n"
                    .as_bytes(),
            )
            .unwrap();
        let records = converter.finish();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].email, "a@example.com");
        assert_eq!(records[0].name.as_deref(), Some("Second"));
        assert_eq!(records[1].email, "b@example.com");
    }

    #[test]
    fn test_only_active_subscriptions_for_known_customers() {
        let mut converter = converter();
        let applied = converter
            .load_subscriptions(
                "Member Email,Status,Plan,Created,Renewal Date\n\
                 jane@example.com,Active,Family Membership,2023-06-15,2024-06-15\n\
                 sam@example.com,cancelled,Individual Membership,2023-01-01,\n\
                 ghost@example.com,active,Premium Membership,,\n"
                    .as_bytes(),
            )
            .unwrap();
        assert_eq!(applied, 1);

        let records = converter.finish();
        let subscription = records[0].subscription.as_ref().unwrap();
        assert_eq!(subscription.plan_name, "Family Membership");
        assert!(subscription.is_active);
        assert_eq!(subscription.start_date.as_deref(), Some("2023-06-15"));
        assert_eq!(subscription.next_renewal_date.as_deref(), Some("2024-06-15"));
        assert!(records[1].subscription.is_none());
    }

    #[test]
    fn test_subscription_defaults() {
        let mut converter = converter();
        converter
            .load_subscriptions("Email,Status\nsam@example.com,active\n".as_bytes())
            .unwrap();
        let records = converter.finish();

        let subscription = records[1].subscription.as_ref().unwrap();
        assert_eq!(subscription.plan_name, DEFAULT_PLAN_NAME);
        assert!(subscription.start_date.is_none());
        assert!(subscription.next_renewal_date.is_none());
    }

    #[test]
    fn test_orders_append_in_file_order() {
        let mut converter = converter();
        let applied = converter
            .load_orders(
                "Customer Email,Order Date,Total,Items\n\
                 jane@example.com,2024-01-05,49.00,Day Pass\n\
                 nobody@example.com,2024-01-06,10.00,Towel\n\
                 JANE@example.com,2024-02-05,12.50,Smoothie\n"
                    .as_bytes(),
            )
            .unwrap();
        assert_eq!(applied, 2);

        let records = converter.finish();
        let orders = &records[0].order_history;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].item, "Day Pass");
        assert_eq!(orders[1].amount, "12.50");
    }

    #[test]
    fn test_order_defaults_when_columns_missing() {
        let mut converter = converter();
        converter
            .load_orders("Email,Date\nsam@example.com,2024-03-01\n".as_bytes())
            .unwrap();
        let records = converter.finish();

        let order = &records[1].order_history[0];
        assert_eq!(order.amount, DEFAULT_ORDER_AMOUNT);
        assert_eq!(order.item, DEFAULT_ORDER_ITEM);
    }

    #[test]
    fn test_summary_and_json_shape() {
        let mut converter = converter();
        converter
            .load_orders("Email,Total\njane@example.com,5\n".as_bytes())
            .unwrap();
        let records = converter.finish();

        assert_eq!(
            ConversionSummary::of(&records),
            ConversionSummary {
                total: 2,
                with_subscriptions: 0,
                with_orders: 1,
            }
        );

        let json = serde_json::to_value(&records).unwrap();
        assert_eq!(json[0]["wixId"], "w-1");
        assert_eq!(json[0]["orderHistory"][0]["amount"], "5");
        assert!(json[1].get("orderHistory").is_none());
        assert!(json[1].get("address").is_none());
        assert!(json[1].get("subscription").is_none());
    }
}
