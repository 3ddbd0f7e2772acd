use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product: String,
    pub quantity: u32,
}

/// Gating knobs for the accumulation state machine.
///
/// The reference conversation flow accepts add/remove intents before a
/// new-order intent has been seen, so `require_active_order` defaults to
/// off. Deployments that want an explicit "start a new order" step can turn
/// it on and add/remove become no-ops until the session is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrderPolicy {
    pub require_active_order: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added { count: usize },
    LengthMismatch,
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    Applied { removed: usize, decremented: usize },
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutOutcome {
    EmptyOrder,
    Completed { lines: Vec<LineItem>, summary: String },
}

/// One conversation's accumulating order.
///
/// Line items are insertion-ordered and a product may appear in several
/// entries before checkout; duplicates are merged only at finalize time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderSession {
    active: bool,
    line_items: Vec<LineItem>,
    policy: OrderPolicy,
}

impl OrderSession {
    pub fn new(policy: OrderPolicy) -> Self {
        Self { active: false, line_items: Vec::new(), policy }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    /// Marks the session as taking an order. Items accumulated earlier are
    /// kept: a mid-order restart does not clear pending lines.
    pub fn start_new_order(&mut self) {
        self.active = true;
    }

    /// Appends one line item per product/quantity pair. Entries are not
    /// merged here and duplicate product names are allowed to coexist.
    pub fn add_items(&mut self, products: &[String], quantities: &[u32]) -> AddOutcome {
        if self.policy.require_active_order && !self.active {
            return AddOutcome::Inactive;
        }

        if products.len() != quantities.len() {
            return AddOutcome::LengthMismatch;
        }

        for (product, quantity) in products.iter().zip(quantities) {
            self.line_items.push(LineItem { product: product.clone(), quantity: *quantity });
        }

        AddOutcome::Added { count: products.len() }
    }

    /// Removes or decrements line items by exact product name.
    ///
    /// Each requested product touches only the first matching entry; names
    /// not present are skipped silently. A removal amount strictly below the
    /// current quantity decrements in place, anything else (equal, larger,
    /// or no amount supplied at that index) drops the entry entirely.
    pub fn remove_items(&mut self, products: &[String], quantities: &[u32]) -> RemoveOutcome {
        if self.policy.require_active_order && !self.active {
            return RemoveOutcome::Inactive;
        }

        let mut removed = 0;
        let mut decremented = 0;

        for (index, product) in products.iter().enumerate() {
            let Some(position) =
                self.line_items.iter().position(|item| item.product == *product)
            else {
                continue;
            };

            match quantities.get(index) {
                Some(&amount) if amount < self.line_items[position].quantity => {
                    self.line_items[position].quantity -= amount;
                    decremented += 1;
                }
                _ => {
                    self.line_items.remove(position);
                    removed += 1;
                }
            }
        }

        RemoveOutcome::Applied { removed, decremented }
    }

    /// Merges accumulated lines by product name, renders the confirmation
    /// summary, and resets the session.
    ///
    /// An empty session returns `EmptyOrder` without touching any state,
    /// including the active flag. Persisting the merged order is the
    /// caller's job; the summary is available regardless of what the store
    /// later does with it.
    pub fn finalize(&mut self) -> CheckoutOutcome {
        if self.line_items.is_empty() {
            return CheckoutOutcome::EmptyOrder;
        }

        let lines = merge_line_items(&self.line_items);
        let summary = render_summary(&lines);

        self.line_items.clear();
        self.active = false;

        CheckoutOutcome::Completed { lines, summary }
    }
}

/// A finalized order as handed to the order store. Written once per
/// checkout; `lines` holds one entry per distinct product in order of first
/// appearance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub session_id: SessionId,
    pub lines: Vec<LineItem>,
    pub placed_at: DateTime<Utc>,
}

fn merge_line_items(items: &[LineItem]) -> Vec<LineItem> {
    let mut merged: Vec<LineItem> = Vec::new();

    for item in items {
        match merged.iter_mut().find(|line| line.product == item.product) {
            Some(line) => line.quantity += item.quantity,
            None => merged.push(item.clone()),
        }
    }

    merged
}

fn render_summary(lines: &[LineItem]) -> String {
    let details = lines
        .iter()
        .map(|line| format!("{}: {}", line.product, line.quantity))
        .collect::<Vec<_>>()
        .join(", ");

    format!("You have ordered\n({details})")
}
