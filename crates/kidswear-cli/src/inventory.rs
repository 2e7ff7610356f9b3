use kidswear_services::{CatalogStore, Services};

pub(crate) async fn run_alerts<S: CatalogStore>(services: &Services<S>) -> anyhow::Result<()> {
    let alerts = services.ledger.get_inventory_alerts().await?;
    if alerts.is_empty() {
        println!("no inventory alerts");
        return Ok(());
    }

    println!(
        "{:<14} {:<38} {:<8} {:>5} {:>6} {:>8} {:>9}",
        "severity", "product", "size", "color", "stock", "reserved", "threshold"
    );
    for alert in &alerts {
        println!(
            "{:<14} {:<38} {:<8} {:>5} {:>6} {:>8} {:>9}",
            format!("{:?}", alert.severity),
            alert.key.product_id,
            alert.key.size,
            alert.key.color_index,
            alert.stock_quantity,
            alert.reserved_quantity,
            alert.low_stock_threshold
        );
    }
    println!("{} variant(s) need attention", alerts.len());
    Ok(())
}
