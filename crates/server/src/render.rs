use std::sync::Arc;

use tenderdesk_core::domain::analysis::BidResponse;
use tenderdesk_core::domain::tender::TenderRecord;
use tera::{Context, Tera};

pub const BID_RESPONSE_TEMPLATE: &str = "bid_response.html";
pub const CURRENCY: &str = "INR";

pub fn templates() -> Result<Arc<Tera>, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(
        BID_RESPONSE_TEMPLATE,
        include_str!("../../../templates/response/bid_response.html"),
    )?;
    Ok(Arc::new(tera))
}

pub fn render_bid_response(
    templates: &Tera,
    tender: &TenderRecord,
    bid: &BidResponse,
) -> Result<String, tera::Error> {
    let mut context = Context::new();
    context.insert("tender", tender);
    context.insert("bid", bid);
    context.insert("currency", CURRENCY);
    context.insert("generated_at", &bid.generated_at.format("%Y-%m-%d %H:%M UTC").to_string());
    templates.render(BID_RESPONSE_TEMPLATE, &context)
}
