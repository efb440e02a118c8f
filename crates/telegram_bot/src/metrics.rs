//! Bot counters, recorded through the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op.

use metrics::describe_counter;

pub const UPDATES_TOTAL: &str = "bot_updates_total";
pub const TRANSACTIONS_SAVED_TOTAL: &str = "bot_transactions_saved_total";

/// Register metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(UPDATES_TOTAL, "Chat updates received");
    describe_counter!(
        TRANSACTIONS_SAVED_TOTAL,
        "Transaction create attempts by outcome"
    );
}

pub(crate) fn record_update() {
    metrics::counter!(UPDATES_TOTAL).increment(1);
}

pub(crate) fn record_transaction_saved(ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(TRANSACTIONS_SAVED_TOTAL, "status" => status).increment(1);
}
