//! Throughput benchmark for delta payload writing.
//!
//! Writes a delta response of synthetic customers (or customers loaded from
//! a JSON file) at every metadata level and reports size and speed.
//!
//! Usage: `bench-delta [count|customers.json] [4.0|4.01]`
//! Set `RUST_LOG=odata_writer=debug` to see scope transitions.

use std::fs;
use std::path::Path;
use std::time::Instant;

use odata_writer::{
    DeletedResourceBuilder, DeletionReason, DeltaDeletedLink, DeltaResourceSet, EdmModel,
    EntityType, JsonTokenWriter, MetadataLevel, NestedResourceInfo, ODataVersion, PayloadWriter,
    ResourceBuilder, WriterError, WriterSettings,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_COUNT: usize = 50_000;

#[derive(Debug, Clone, Deserialize)]
struct Customer {
    id: String,
    name: String,
    city: String,
    #[serde(default)]
    orders: Vec<i64>,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct LevelReport {
    level: String,
    bytes: usize,
    millis: f64,
    mb_per_sec: f64,
}

#[derive(Debug, Serialize)]
struct Report {
    version: String,
    customers: usize,
    levels: Vec<LevelReport>,
}

fn synthesize(count: usize) -> Vec<Customer> {
    (0..count)
        .map(|i| Customer {
            id: format!("C{i:06}"),
            name: format!("Customer {i}"),
            city: ["Berlin", "London", "Madrid", "Tsawassen"][i % 4].to_string(),
            orders: (0..(i % 3) as i64).map(|o| i as i64 * 10 + o).collect(),
            deleted: i % 10 == 9,
        })
        .collect()
}

fn load(arg: Option<String>) -> Vec<Customer> {
    let Some(arg) = arg else {
        return synthesize(DEFAULT_COUNT);
    };
    if let Ok(count) = arg.parse::<usize>() {
        return synthesize(count);
    }
    let path = Path::new(&arg);
    let json = fs::read_to_string(path).expect("Failed to read customers file");
    serde_json::from_str(&json).expect("Failed to parse customers file")
}

fn model() -> EdmModel {
    let mut model = EdmModel::new();
    model.add_entity_type(
        EntityType::new("NS.Customer")
            .key("CustomerID")
            .navigation("Orders", "NS.Order", true, Some("Orders")),
    );
    model.add_entity_type(EntityType::new("NS.Order").key("OrderID"));
    model.add_entity_set("Customers", "NS.Customer");
    model.add_entity_set("Orders", "NS.Order");
    model
}

fn write_delta(
    customers: &[Customer],
    settings: WriterSettings,
    model: &EdmModel,
) -> Result<Vec<u8>, WriterError> {
    let version = settings.version;
    let mut writer = PayloadWriter::new(JsonTokenWriter::new(Vec::with_capacity(1 << 20)), settings)
        .with_schema(model)
        .for_navigation_source("Customers");

    let mut set = DeltaResourceSet::new();
    set.count = Some(customers.len() as i64);
    writer.write_start(set)?;

    for customer in customers {
        if customer.deleted {
            writer.write_start(
                DeletedResourceBuilder::new(DeletionReason::Deleted)
                    .property("CustomerID", customer.id.as_str())
                    .build(),
            )?;
            writer.write_end()?;
            continue;
        }

        writer.write_start(
            ResourceBuilder::new()
                .property("CustomerID", customer.id.as_str())
                .property("Name", customer.name.as_str())
                .property("City", customer.city.as_str())
                .build(),
        )?;
        if version == ODataVersion::V401 && !customer.orders.is_empty() {
            writer.write_start(NestedResourceInfo::collection("Orders"))?;
            writer.write_start(DeltaResourceSet::new())?;
            for order in &customer.orders {
                writer.write_start(ResourceBuilder::new().property("OrderID", *order).build())?;
                writer.write_end()?;
            }
            writer.write_end()?;
            writer.write_end()?;
        }
        writer.write_end()?;

        if version == ODataVersion::V4 {
            for order in &customer.orders {
                writer.write_delta_link(DeltaDeletedLink::new(
                    format!("Customers('{}')", customer.id),
                    "Orders",
                    format!("Orders({order})"),
                ))?;
            }
        }
    }

    writer.set_delta_link("Customers?$deltatoken=bench")?;
    writer.write_end()?;
    Ok(writer.into_inner().into_inner())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let customers = load(args.next());
    let version: ODataVersion = args
        .next()
        .unwrap_or_else(|| "4.01".to_string())
        .parse()
        .expect("invalid version");
    let model = model();

    println!("Writing {} customers as OData {} delta", customers.len(), version);

    let mut levels = Vec::new();
    for level in [MetadataLevel::None, MetadataLevel::Minimal, MetadataLevel::Full] {
        let settings = WriterSettings::response(version)
            .with_service_root("http://host/service/")
            .with_metadata_level(level);

        let start = Instant::now();
        let bytes = write_delta(&customers, settings, &model).expect("Failed to write payload");
        let elapsed = start.elapsed();

        // The payload must be well-formed JSON.
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).expect("Payload is not valid JSON");
        assert!(parsed["value"].is_array());

        let mb_per_sec = (bytes.len() as f64 / 1_000_000.0) / elapsed.as_secs_f64();
        info!(?level, bytes = bytes.len(), "payload written");
        println!(
            "  {:<8} {:>12} bytes in {:?} ({:.2} MB/s)",
            format!("{level:?}"),
            bytes.len(),
            elapsed,
            mb_per_sec
        );
        levels.push(LevelReport {
            level: format!("{level:?}").to_lowercase(),
            bytes: bytes.len(),
            millis: elapsed.as_secs_f64() * 1000.0,
            mb_per_sec,
        });
    }

    let report = Report {
        version: version.to_string(),
        customers: customers.len(),
        levels,
    };
    println!(
        "\n{}",
        serde_json::to_string_pretty(&report).expect("Failed to serialize report")
    );
}
