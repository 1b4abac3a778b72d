//! Writes a small delta response to stdout.
//!
//! Usage: `cargo run --example write_delta -- [4.0|4.01] [none|minimal|full]`

use std::io::{self, Write};

use odata_writer::{
    DeletedResourceBuilder, DeletionReason, DeltaDeletedLink, DeltaLink, DeltaResourceSet, EdmModel,
    EntityType, JsonTokenWriter, MetadataLevel, NestedResourceInfo, ODataVersion, PayloadWriter,
    ResourceBuilder, WriterError, WriterSettings,
};

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

fn write(settings: WriterSettings, model: &EdmModel) -> Result<Vec<u8>, WriterError> {
    let version = settings.version;
    let mut writer = PayloadWriter::new(JsonTokenWriter::new(Vec::new()), settings)
        .with_schema(model)
        .for_navigation_source("Customers");

    let mut set = DeltaResourceSet::new();
    set.count = Some(3);
    set.delta_link = Some("Customers?$deltatoken=8015".to_string());
    writer.write_start(set)?;

    writer.write_start(
        ResourceBuilder::new()
            .property("CustomerID", "BOTTM")
            .property("ContactName", "Susan Halvenstern")
            .build(),
    )?;
    if version == ODataVersion::V401 {
        writer.write_start(NestedResourceInfo::collection("Orders"))?;
        writer.write_start(DeltaResourceSet::new())?;
        writer.write_start(
            DeletedResourceBuilder::new(DeletionReason::Deleted)
                .property("OrderID", 10643)
                .build(),
        )?;
        writer.write_end()?;
        writer.write_end()?;
        writer.write_end()?;
    }
    writer.write_end()?;

    writer.write_delta_link(DeltaLink::new("Customers('BOTTM')", "Orders", "Orders(10645)"))?;
    writer.write_delta_link(DeltaDeletedLink::new("Customers('ALFKI')", "Orders", "Orders(10643)"))?;

    writer.write_start(
        DeletedResourceBuilder::new(DeletionReason::Changed)
            .property("CustomerID", "ANTON")
            .build(),
    )?;
    writer.write_end()?;
    writer.write_end()?;

    Ok(writer.into_inner().into_inner())
}

fn main() {
    let mut args = std::env::args().skip(1);
    let version: ODataVersion = args
        .next()
        .unwrap_or_else(|| "4.01".to_string())
        .parse()
        .expect("invalid version");
    let level: MetadataLevel = args
        .next()
        .unwrap_or_else(|| "minimal".to_string())
        .parse()
        .expect("invalid metadata level");

    let settings = WriterSettings::response(version)
        .with_service_root("http://host/service/")
        .with_metadata_level(level);
    let model = model();

    match write(settings, &model) {
        Ok(bytes) => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes).expect("Failed to write output");
            stdout.write_all(b"\n").expect("Failed to write output");
        }
        Err(err) => {
            eprintln!("error {}: {}", err.code().code(), err);
            std::process::exit(1);
        }
    }
}
