use serde::{Deserialize, Serialize};
use serde_json::Value;

use cartbot_core::domain::order::SessionId;

/// The four conversation intents that drive the order state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderIntent {
    NewOrder,
    AddItems,
    RemoveItems,
    Checkout,
}

impl OrderIntent {
    /// Maps an NLU intent display name to an order intent.
    ///
    /// Follow-up intents carry their input context in the display name
    /// ("order.add - context: ongoing-order"); everything after " - " is
    /// ignored. Unknown names return `None` and the dispatcher passes the
    /// NLU's own response through.
    pub fn from_display_name(name: &str) -> Option<Self> {
        let base = name.split(" - ").next().unwrap_or(name).trim().to_ascii_lowercase();
        match base.as_str() {
            "order.new" | "new.order" => Some(Self::NewOrder),
            "order.add" | "add.order" => Some(Self::AddItems),
            "order.remove" | "remove.order" => Some(Self::RemoveItems),
            "order.complete" | "order.completed" | "order.checkout" => Some(Self::Checkout),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRef {
    #[serde(default, rename = "displayName")]
    pub display_name: String,
}

/// Loosely-typed parameter bundle as the NLU sends it: parallel lists of
/// product names and numbers, where a number entry may be absent or junk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawParameters {
    pub product: Vec<String>,
    pub number: Vec<Value>,
}

/// One recognized conversation turn as returned by the NLU.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResult {
    pub query_text: String,
    pub intent: IntentRef,
    pub parameters: RawParameters,
    pub fulfillment_text: String,
    pub language_code: String,
}

/// Typed parameters handed to the order state machine. Conversion from the
/// raw bundle happens here, at the dispatcher boundary: every raw number
/// entry maps to exactly one quantity, with missing, non-numeric, or
/// negative values collapsing to 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderParameters {
    pub products: Vec<String>,
    pub quantities: Vec<u32>,
}

impl From<&RawParameters> for OrderParameters {
    fn from(raw: &RawParameters) -> Self {
        Self {
            products: raw.product.clone(),
            quantities: raw.number.iter().map(numeric_quantity).collect(),
        }
    }
}

fn numeric_quantity(value: &Value) -> u32 {
    value
        .as_f64()
        .filter(|number| number.is_finite() && *number >= 0.0)
        .map(|number| number as u32)
        .unwrap_or(0)
}

/// Fulfillment request as posted by the NLU's webhook integration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default)]
    pub response_id: String,
    pub session: String,
    pub query_result: QueryResult,
}

impl WebhookRequest {
    /// The conversation key is the trailing segment of the fully qualified
    /// session name ("projects/<p>/agent/sessions/<id>").
    pub fn session_id(&self) -> SessionId {
        let raw = self.session.rsplit('/').next().unwrap_or(&self.session);
        SessionId(raw.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub fulfillment_text: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{OrderIntent, OrderParameters, RawParameters, WebhookRequest};

    #[test]
    fn display_names_map_to_order_intents() {
        assert_eq!(OrderIntent::from_display_name("order.new"), Some(OrderIntent::NewOrder));
        assert_eq!(OrderIntent::from_display_name("Order.Add"), Some(OrderIntent::AddItems));
        assert_eq!(
            OrderIntent::from_display_name("order.remove - context: ongoing-order"),
            Some(OrderIntent::RemoveItems)
        );
        assert_eq!(
            OrderIntent::from_display_name("order.completed"),
            Some(OrderIntent::Checkout)
        );
        assert_eq!(OrderIntent::from_display_name("smalltalk.greeting"), None);
    }

    #[test]
    fn raw_numbers_convert_with_zero_defaults() {
        let raw = RawParameters {
            product: vec!["tea".to_string(), "coffee".to_string(), "soda".to_string()],
            number: vec![json!(2.0), json!(null), json!("many")],
        };

        let params = OrderParameters::from(&raw);

        assert_eq!(params.products.len(), 3);
        assert_eq!(params.quantities, vec![2, 0, 0]);
    }

    #[test]
    fn negative_numbers_collapse_to_zero() {
        let raw = RawParameters { product: vec!["tea".to_string()], number: vec![json!(-3.0)] };

        let params = OrderParameters::from(&raw);

        assert_eq!(params.quantities, vec![0]);
    }

    #[test]
    fn webhook_request_deserializes_and_exposes_session_id() {
        let request: WebhookRequest = serde_json::from_value(json!({
            "responseId": "resp-1",
            "session": "projects/demo/agent/sessions/abc-123",
            "queryResult": {
                "queryText": "two pizzas please",
                "intent": { "displayName": "order.add" },
                "parameters": { "product": ["pizza"], "number": [2.0] },
                "fulfillmentText": "Added to your order.",
                "languageCode": "en-US"
            }
        }))
        .expect("webhook request should deserialize");

        assert_eq!(request.session_id().0, "abc-123");
        assert_eq!(request.query_result.intent.display_name, "order.add");
        assert_eq!(request.query_result.parameters.product, vec!["pizza".to_string()]);
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let request: WebhookRequest = serde_json::from_value(json!({
            "session": "bare-session",
            "queryResult": { "intent": { "displayName": "order.new" } }
        }))
        .expect("sparse webhook request should deserialize");

        assert_eq!(request.session_id().0, "bare-session");
        assert!(request.query_result.parameters.product.is_empty());
        assert!(request.query_result.fulfillment_text.is_empty());
    }
}
