use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use proptest::prelude::*;
use serde_json::Value;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::error::WriterError;
use crate::model::{
    DeletedResource, DeletedResourceBuilder, DeletionReason, DeltaDeletedLink, DeltaLink,
    DeltaResourceSet, EntityReferenceLink, InstanceAnnotation, NestedResourceInfo, Operation,
    PropertyInfo, Resource, ResourceBuilder, ResourceSet, SelectExpand, SerializationInfo,
};
use crate::schema::{EdmModel, EntityType};
use crate::settings::{MetadataLevel, ODataVersion, WriterSettings};
use crate::sink::JsonTokenWriter;
use crate::writer::{AsyncPayloadWriter, PayloadWriter, ScopeState};

const ROOT: &str = "http://host/service/";

type TestWriter<'m> = PayloadWriter<'m, JsonTokenWriter<Vec<u8>>>;

fn writer<'m>(settings: WriterSettings) -> TestWriter<'m> {
    PayloadWriter::new(JsonTokenWriter::new(Vec::new()), settings).for_navigation_source("Customers")
}

fn response(version: ODataVersion) -> WriterSettings {
    WriterSettings::response(version).with_service_root(ROOT)
}

fn output(writer: TestWriter<'_>) -> String {
    String::from_utf8(writer.into_inner().into_inner()).unwrap()
}

fn written(writer: &TestWriter<'_>) -> String {
    String::from_utf8(writer.get_ref().get_ref().clone()).unwrap()
}

fn customers_model() -> EdmModel {
    let mut model = EdmModel::new();
    model.add_entity_type(
        EntityType::new("NS.Customer")
            .key("CustomerID")
            .navigation("Orders", "NS.Order", true, Some("Orders"))
            .stream_property("Photo"),
    );
    model.add_entity_type(EntityType::derived("NS.VipCustomer", "NS.Customer"));
    model.add_entity_type(EntityType::new("NS.Order").key("OrderID"));
    model.add_entity_set("Customers", "NS.Customer");
    model.add_entity_set("Orders", "NS.Order");
    model
}

fn delta_set(count: Option<i64>, delta_link: Option<&str>) -> DeltaResourceSet {
    let mut set = DeltaResourceSet::new();
    set.count = count;
    set.delta_link = delta_link.map(str::to_string);
    set
}

// =============================================================================
// DELTA RESPONSES
// =============================================================================

#[test]
fn test_empty_delta_response_40() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(delta_set(Some(5), Some("Customers?$expand=Orders&$deltatoken=8015")))
        .unwrap();
    w.write_end().unwrap();
    assert_eq!(w.state(), ScopeState::Completed);
    assert_eq!(
        output(w),
        r#"{"@odata.context":"http://host/service/$metadata#Customers/$delta","@odata.count":5,"@odata.deltaLink":"Customers?$expand=Orders&$deltatoken=8015","value":[]}"#
    );
}

#[test]
fn test_empty_delta_request_carries_context_only() {
    let settings = WriterSettings::request(ODataVersion::V4).with_service_root(ROOT);
    let mut w = writer(settings);
    w.write_start(delta_set(Some(5), Some("Customers?$deltatoken=8015"))).unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"@odata.context":"http://host/service/$metadata#Customers/$delta","value":[]}"#
    );
}

fn write_mixed_delta(w: &mut TestWriter<'_>) -> Result<(), WriterError> {
    w.write_start(delta_set(Some(5), Some("Customers?$expand=Orders&$deltatoken=8015")))?;

    w.write_start(
        ResourceBuilder::new()
            .id("Customers('BOTTM')")
            .property("ContactName", "Susan Halvenstern")
            .build(),
    )?;
    w.write_end()?;

    w.write_delta_link(DeltaDeletedLink::new("Customers('ALFKI')", "Orders", "Orders('10643')"))?;
    w.write_delta_link(DeltaLink::new("Customers('BOTTM')", "Orders", "Orders('10645')"))?;

    w.write_start(
        ResourceBuilder::new()
            .id("Orders(10643)")
            .serialization_info(SerializationInfo::entity_set("Orders", "NS.Order"))
            .build(),
    )?;
    w.write_start(NestedResourceInfo::single("ShippingAddress"))?;
    w.write_start(
        ResourceBuilder::new()
            .property("Street", "23 Tsawassen Blvd.")
            .property("City", "Tsawassen")
            .property("Region", "BC")
            .property("PostalCode", "T2F 8M4")
            .build(),
    )?;
    w.write_end()?;
    w.write_end()?;
    w.write_end()?;

    w.write_start(
        DeletedResourceBuilder::new(DeletionReason::Deleted)
            .id("Customers('ANTON')")
            .build(),
    )?;
    w.write_end()?;

    w.write_end()
}

const MIXED_DELTA_40: &str = concat!(
    r#"{"@odata.context":"http://host/service/$metadata#Customers/$delta","@odata.count":5,"#,
    r#""@odata.deltaLink":"Customers?$expand=Orders&$deltatoken=8015","value":["#,
    r#"{"@odata.id":"Customers('BOTTM')","ContactName":"Susan Halvenstern"},"#,
    r#"{"@odata.context":"http://host/service/$metadata#Customers/$deletedLink","source":"Customers('ALFKI')","relationship":"Orders","target":"Orders('10643')"},"#,
    r#"{"@odata.context":"http://host/service/$metadata#Customers/$link","source":"Customers('BOTTM')","relationship":"Orders","target":"Orders('10645')"},"#,
    r#"{"@odata.context":"http://host/service/$metadata#Orders/$entity","@odata.id":"Orders(10643)","#,
    r#""ShippingAddress":{"Street":"23 Tsawassen Blvd.","City":"Tsawassen","Region":"BC","PostalCode":"T2F 8M4"}},"#,
    r#"{"@odata.context":"http://host/service/$metadata#Customers/$deletedEntity","id":"Customers('ANTON')","reason":"deleted"}"#,
    r#"]}"#
);

#[test]
fn test_mixed_delta_response_40() {
    let mut w = writer(response(ODataVersion::V4));
    write_mixed_delta(&mut w).unwrap();
    assert_eq!(output(w), MIXED_DELTA_40);
}

#[test]
fn test_mixed_delta_output_parses() {
    let mut w = writer(response(ODataVersion::V4));
    write_mixed_delta(&mut w).unwrap();
    let parsed: Value = serde_json::from_str(&output(w)).unwrap();

    let items = parsed["value"].as_array().unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(items[3]["ShippingAddress"]["City"], "Tsawassen");
    assert_eq!(items[4]["reason"], "deleted");
    // Member order is preserved.
    let keys: Vec<&str> = parsed.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["@odata.context", "@odata.count", "@odata.deltaLink", "value"]);
}

#[test]
fn test_deleted_resource_401_uses_removed() {
    let mut w = writer(response(ODataVersion::V401));
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(
        DeletedResourceBuilder::new(DeletionReason::Changed)
            .property("CustomerID", "ANTON")
            .build(),
    )
    .unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"@context":"http://host/service/$metadata#Customers/$delta","value":[{"@removed":{"reason":"changed"},"CustomerID":"ANTON"}]}"#
    );
}

#[test]
fn test_deleted_resource_40_response_requires_identity() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(DeltaResourceSet::new()).unwrap();
    let before = written(&w);

    let err = w
        .write_start(DeletedResource::new(DeletionReason::Changed))
        .unwrap_err();
    assert!(matches!(
        err,
        WriterError::DeltaResourceWithoutIdOrKeyProperties { ref navigation_source } if navigation_source == "Customers"
    ));
    assert_eq!(written(&w), before);
    assert!(w.is_failed());
}

#[test]
fn test_deleted_resource_40_request_without_identity() {
    let settings = WriterSettings::request(ODataVersion::V4).with_service_root(ROOT);
    let mut w = writer(settings);
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(DeletedResource::new(DeletionReason::Changed)).unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"@odata.context":"http://host/service/$metadata#Customers/$delta","value":[{"@odata.context":"http://host/service/$metadata#Customers/$deletedEntity","reason":"changed"}]}"#
    );
}

#[test]
fn test_deleted_resource_40_synthesizes_id_from_keys() {
    let model = customers_model();
    let mut w = writer(response(ODataVersion::V4)).with_schema(&model);
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(
        DeletedResourceBuilder::new(DeletionReason::Deleted)
            .property("CustomerID", "O'NEIL")
            .build(),
    )
    .unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"@odata.context":"http://host/service/$metadata#Customers/$delta","value":[{"@odata.context":"http://host/service/$metadata#Customers/$deletedEntity","id":"Customers('O''NEIL')","reason":"deleted"}]}"#
    );
}

#[test]
fn test_live_delta_resource_needs_id_or_keys_with_schema() {
    let model = customers_model();
    let mut w = writer(response(ODataVersion::V4)).with_schema(&model);
    w.write_start(DeltaResourceSet::new()).unwrap();
    let err = w
        .write_start(ResourceBuilder::new().property("ContactName", "Maria").build())
        .unwrap_err();
    assert!(matches!(err, WriterError::DeltaResourceWithoutIdOrKeyProperties { .. }));
}

#[test]
fn test_live_delta_resource_with_keys_is_accepted() {
    let model = customers_model();
    let mut w = writer(response(ODataVersion::V4)).with_schema(&model);
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(ResourceBuilder::new().property("CustomerID", "ALFKI").build())
        .unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert!(output(w).contains(r#"{"CustomerID":"ALFKI"}"#));
}

#[test]
fn test_delta_link_in_resource_set_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(ResourceSet::new()).unwrap();
    let before = written(&w);
    let err = w
        .write_delta_link(DeltaDeletedLink::new("Customers('ALFKI')", "Orders", "Orders(1)"))
        .unwrap_err();
    assert!(matches!(
        err,
        WriterError::CannotWriteDeltaWithResourceSetWriter { item: "DeltaDeletedLink" }
    ));
    assert_eq!(written(&w), before);
}

#[test]
fn test_deleted_resource_in_resource_set_rejected() {
    let mut w = writer(response(ODataVersion::V401));
    w.write_start(ResourceSet::new()).unwrap();
    let err = w
        .write_start(DeletedResource::new(DeletionReason::Deleted))
        .unwrap_err();
    assert!(matches!(err, WriterError::CannotWriteDeltaWithResourceSetWriter { .. }));
}

#[test]
fn test_nested_delta_set_401() {
    let mut w = writer(response(ODataVersion::V401));
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(
        ResourceBuilder::new()
            .id("Customers('ALFKI')")
            .property("CustomerID", "ALFKI")
            .build(),
    )
    .unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(
        DeletedResourceBuilder::new(DeletionReason::Deleted)
            .id("Orders(1)")
            .build(),
    )
    .unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"@context":"http://host/service/$metadata#Customers/$delta","value":[{"@id":"Customers('ALFKI')","CustomerID":"ALFKI","Orders@delta":[{"@removed":{"reason":"deleted"},"@id":"Orders(1)"}]}]}"#
    );
}

#[test]
fn test_nested_delta_set_40_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(ResourceBuilder::new().id("Customers('ALFKI')").build())
        .unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    let err = w.write_start(DeltaResourceSet::new()).unwrap_err();
    assert!(matches!(err, WriterError::NestedDeltaNotSupported { ref property } if property == "Orders"));
}

#[test]
fn test_foreign_item_type_checked_against_its_source() {
    let model = customers_model();
    let mut w = writer(response(ODataVersion::V4)).with_schema(&model);
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(
        ResourceBuilder::new()
            .type_name("NS.Order")
            .property("OrderID", 7)
            .serialization_info(SerializationInfo::entity_set("Orders", "NS.Order"))
            .build(),
    )
    .unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert!(output(w).contains(
        r#"{"@odata.context":"http://host/service/$metadata#Orders/$entity","OrderID":7}"#
    ));
}

// =============================================================================
// TYPE ANNOTATIONS AND METADATA LEVELS
// =============================================================================

fn write_vip(level: MetadataLevel) -> Result<String, WriterError> {
    let model = customers_model();
    let mut w = writer(response(ODataVersion::V4).with_metadata_level(level)).with_schema(&model);
    w.write_start(ResourceSet::new())?;
    w.write_start(
        ResourceBuilder::new()
            .type_name("NS.VipCustomer")
            .property("CustomerID", 1)
            .build(),
    )?;
    w.write_end()?;
    w.write_end()?;
    Ok(output(w))
}

#[test]
fn test_subtype_annotated_at_minimal() {
    assert_eq!(
        write_vip(MetadataLevel::Minimal).unwrap(),
        r##"{"@odata.context":"http://host/service/$metadata#Customers","value":[{"@odata.type":"#NS.VipCustomer","CustomerID":1}]}"##
    );
}

#[test]
fn test_subtype_annotated_at_full() {
    let out = write_vip(MetadataLevel::Full).unwrap();
    assert!(out.contains(r##""@odata.type":"#NS.VipCustomer""##));
    assert!(out.contains(r#""@odata.id":"http://host/service/Customers(1)""#));
}

#[test]
fn test_no_control_information_at_none() {
    assert_eq!(write_vip(MetadataLevel::None).unwrap(), r#"{"value":[{"CustomerID":1}]}"#);
}

#[test]
fn test_incompatible_type_rejected_before_output() {
    let model = customers_model();
    let mut w = writer(response(ODataVersion::V4)).with_schema(&model);
    w.write_start(ResourceSet::new()).unwrap();
    let before = written(&w);
    let err = w
        .write_start(ResourceBuilder::new().type_name("NS.Order").build())
        .unwrap_err();
    assert!(matches!(err, WriterError::IncompatibleTypes { .. }));
    assert_eq!(written(&w), before);
    assert!(before.ends_with(r#""value":["#));
}

#[test]
fn test_nested_type_must_match_navigation_target() {
    let model = customers_model();
    let mut w = writer(response(ODataVersion::V401)).with_schema(&model);
    w.write_start(ResourceBuilder::new().property("CustomerID", "ALFKI").build())
        .unwrap();
    w.write_start(NestedResourceInfo::new("Orders")).unwrap();
    w.write_start(ResourceSet::new()).unwrap();
    let err = w
        .write_start(ResourceBuilder::new().type_name("NS.Customer").build())
        .unwrap_err();
    assert!(matches!(
        err,
        WriterError::NestedResourceTypeNotCompatibleWithParentPropertyType { .. }
    ));
}

#[test]
fn test_full_metadata_computes_links() {
    let model = customers_model();
    let settings = response(ODataVersion::V401).with_metadata_level(MetadataLevel::Full);
    let mut w = writer(settings).with_schema(&model);
    w.write_start(ResourceSet::new()).unwrap();
    w.write_start(ResourceBuilder::new().property("CustomerID", "ALFKI").build())
        .unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        concat!(
            r#"{"@context":"http://host/service/$metadata#Customers","value":[{"#,
            r##""@type":"#NS.Customer","##,
            r#""@id":"http://host/service/Customers('ALFKI')","@editLink":"Customers('ALFKI')","#,
            r#""CustomerID":"ALFKI","#,
            r#""Orders@associationLink":"Customers('ALFKI')/Orders/$ref","Orders@navigationLink":"Customers('ALFKI')/Orders","#,
            r#""Photo@mediaReadLink":"Customers('ALFKI')/Photo""#,
            r#"}]}"#
        )
    );
}

#[test]
fn test_expanded_navigation_links_written_once() {
    let model = customers_model();
    let settings = response(ODataVersion::V4).with_metadata_level(MetadataLevel::Full);
    let mut w = writer(settings).with_schema(&model);
    w.write_start(ResourceBuilder::new().property("CustomerID", "ALFKI").build())
        .unwrap();
    w.write_start(NestedResourceInfo::new("Orders")).unwrap();
    w.write_start(ResourceSet::new()).unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();

    let out = output(w);
    assert_eq!(out.matches("Orders@odata.navigationLink").count(), 1);
    assert!(out.contains(r#""Orders@odata.navigationLink":"Customers('ALFKI')/Orders","Orders":[]"#));
}

#[test]
fn test_operations_and_annotations_at_minimal() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(
        ResourceBuilder::new()
            .id("Customers('ALFKI')")
            .annotation("Core.Description", "Preferred")
            .property("CustomerID", "ALFKI")
            .action(Operation::new("#NS.Promote").with_title("Promote"))
            .function(Operation::new("http://host/service/$metadata#NS.TopOrders").with_target("Customers('ALFKI')/NS.TopOrders"))
            .build(),
    )
    .unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        concat!(
            r#"{"@odata.context":"http://host/service/$metadata#Customers/$entity","@odata.id":"Customers('ALFKI')","#,
            r#""@Core.Description":"Preferred","CustomerID":"ALFKI","#,
            r##""#NS.Promote":{"title":"Promote"},"#NS.TopOrders":{"target":"Customers('ALFKI')/NS.TopOrders"}}"##
        )
    );
}

#[test]
fn test_reserved_instance_annotation_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    let mut resource = Resource::new();
    resource
        .instance_annotations
        .push(InstanceAnnotation::new("odata.foo", 1));
    let err = w.write_start(resource).unwrap_err();
    assert!(matches!(err, WriterError::ReservedInstanceAnnotation { .. }));
}

// =============================================================================
// NESTED CONTENT, BINDINGS AND PROPERTIES
// =============================================================================

#[test]
fn test_bindings_in_request() {
    let settings = WriterSettings::request(ODataVersion::V4);
    let mut w = writer(settings);
    w.write_start(ResourceBuilder::new().property("CustomerID", "ALFKI").build())
        .unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    w.write_entity_reference_link(EntityReferenceLink::new("Orders(1)")).unwrap();
    w.write_entity_reference_link(EntityReferenceLink::new("Orders(2)")).unwrap();
    w.write_end().unwrap();
    w.write_start(NestedResourceInfo::single("Manager")).unwrap();
    w.write_entity_reference_link(EntityReferenceLink::new("Customers('BOSS')")).unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"CustomerID":"ALFKI","Orders@odata.bind":["Orders(1)","Orders(2)"],"Manager@odata.bind":"Customers('BOSS')"}"#
    );
}

#[test]
fn test_bindings_then_deep_insert() {
    let mut w = writer(WriterSettings::request(ODataVersion::V401));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    w.write_entity_reference_link(EntityReferenceLink::new("Orders(1)")).unwrap();
    w.write_start(ResourceSet::new()).unwrap();
    w.write_start(ResourceBuilder::new().property("OrderID", 3).build()).unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"Orders@bind":["Orders(1)"],"Orders":[{"OrderID":3}]}"#
    );
}

#[test]
fn test_second_binding_on_single_property_rejected() {
    let mut w = writer(WriterSettings::request(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::single("Manager")).unwrap();
    w.write_entity_reference_link(EntityReferenceLink::new("Customers(1)")).unwrap();
    let err = w
        .write_entity_reference_link(EntityReferenceLink::new("Customers(2)"))
        .unwrap_err();
    assert!(matches!(err, WriterError::NestedResourceInfoCardinalityMismatch { .. }));
}

#[test]
fn test_binding_in_response_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    let err = w
        .write_entity_reference_link(EntityReferenceLink::new("Orders(1)"))
        .unwrap_err();
    assert!(matches!(err, WriterError::EntityReferenceLinkInResponse { ref property } if property == "Orders"));
}

#[test]
fn test_null_single_valued_navigation() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(ResourceBuilder::new().property("CustomerID", "ALFKI").build())
        .unwrap();
    w.write_start(NestedResourceInfo::single("Manager")).unwrap();
    w.write_start(None::<Resource>).unwrap();
    assert_eq!(w.state(), ScopeState::NullResource);
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"@odata.context":"http://host/service/$metadata#Customers/$entity","CustomerID":"ALFKI","Manager":null}"#
    );
}

#[test]
fn test_nested_set_count_and_links() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    w.write_start(
        NestedResourceInfo::collection("Orders")
            .with_url("Customers('ALFKI')/Orders")
            .with_count(2),
    )
    .unwrap();
    let mut set = ResourceSet::new();
    set.next_page_link = Some("Customers('ALFKI')/Orders?$skip=1".to_string());
    w.write_start(set).unwrap();
    w.write_start(ResourceBuilder::new().property("OrderID", 1).build()).unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        concat!(
            r#"{"@odata.context":"http://host/service/$metadata#Customers/$entity","#,
            r#""Orders@odata.navigationLink":"Customers('ALFKI')/Orders","Orders@odata.count":2,"#,
            r#""Orders@odata.nextLink":"Customers('ALFKI')/Orders?$skip=1","Orders":[{"OrderID":1}]}"#
        )
    );
}

#[test]
fn test_deferred_navigation_link() {
    let mut w = writer(response(ODataVersion::V401));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::collection("Orders").with_url("Customers(1)/Orders"))
        .unwrap();
    assert_eq!(w.state(), ScopeState::NestedInfo);
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"@context":"http://host/service/$metadata#Customers/$entity","Orders@navigationLink":"Customers(1)/Orders"}"#
    );
}

#[test]
fn test_property_scope() {
    let settings = response(ODataVersion::V4).with_metadata_level(MetadataLevel::Full);
    let mut w = writer(settings);
    w.write_start(Resource::new()).unwrap();
    let mut info = PropertyInfo::new("Rank");
    info.type_name = Some("Edm.Int32".to_string());
    w.write_start(info).unwrap();
    assert_eq!(w.state(), ScopeState::Property);
    w.write_primitive(3).unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert!(output(w).ends_with(r##""Rank@odata.type":"#Edm.Int32","Rank":3}"##));
}

#[test]
fn test_property_without_value_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    w.write_start(PropertyInfo::new("Rank")).unwrap();
    let err = w.write_end().unwrap_err();
    assert!(matches!(err, WriterError::PropertyWithoutValue { ref property } if property == "Rank"));
}

#[test]
fn test_second_primitive_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    w.write_start(PropertyInfo::new("Rank")).unwrap();
    w.write_primitive(1).unwrap();
    let err = w.write_primitive(2).unwrap_err();
    assert!(matches!(err, WriterError::InvalidTransition { from: "Property", to: "Primitive" }));
}

#[test]
fn test_duplicate_property_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(ResourceBuilder::new().property("Name", "a").build()).unwrap();
    let err = w.write_start(PropertyInfo::new("Name")).unwrap_err();
    assert!(matches!(err, WriterError::DuplicatePropertyName { ref name } if name == "Name"));
}

// =============================================================================
// TRANSITIONS AND FAIL-STOP
// =============================================================================

#[test]
fn test_transition_errors() {
    let mut w = writer(response(ODataVersion::V4));
    assert!(matches!(
        w.write_end().unwrap_err(),
        WriterError::InvalidTransition { from: "Start", to: "End" }
    ));

    let mut w = writer(response(ODataVersion::V4));
    assert!(matches!(
        w.write_start(None::<Resource>).unwrap_err(),
        WriterError::InvalidTransition { from: "Start", to: "NullResource" }
    ));

    let mut w = writer(response(ODataVersion::V4));
    w.write_start(ResourceSet::new()).unwrap();
    assert!(matches!(
        w.write_start(PropertyInfo::new("Name")).unwrap_err(),
        WriterError::InvalidTransition { from: "ResourceSet", to: "Property" }
    ));

    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    assert!(matches!(
        w.write_start(ResourceSet::new()).unwrap_err(),
        WriterError::InvalidTransition { from: "Resource", to: "ResourceSet" }
    ));
}

#[test]
fn test_nested_content_on_40_deleted_resource_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(
        DeletedResourceBuilder::new(DeletionReason::Deleted)
            .id("Customers(1)")
            .build(),
    )
    .unwrap();
    assert_eq!(w.state(), ScopeState::DeletedResource);
    let err = w
        .write_start(NestedResourceInfo::collection("Orders"))
        .unwrap_err();
    assert!(matches!(err, WriterError::InvalidTransitionFrom40DeletedResource { .. }));
}

#[test]
fn test_cardinality_mismatch() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    let err = w.write_start(Resource::new()).unwrap_err();
    assert!(matches!(
        err,
        WriterError::NestedResourceInfoCardinalityMismatch { expected: "collection-valued", .. }
    ));

    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::single("Manager")).unwrap();
    let err = w.write_start(ResourceSet::new()).unwrap_err();
    assert!(matches!(
        err,
        WriterError::NestedResourceInfoCardinalityMismatch { expected: "single-valued", .. }
    ));
}

#[test]
fn test_second_value_in_nested_info_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::single("Manager")).unwrap();
    w.write_start(Resource::new()).unwrap();
    w.write_end().unwrap();
    assert_eq!(w.state(), ScopeState::NestedInfoWithContent);
    let err = w.write_start(Resource::new()).unwrap_err();
    assert!(matches!(
        err,
        WriterError::InvalidTransitionFromExpandedLink { existing: "Resource", attempted: "Resource", .. }
    ));
}

#[test]
fn test_delta_set_after_plain_set_in_nested_info_rejected() {
    let mut w = writer(response(ODataVersion::V401));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    w.write_start(ResourceSet::new()).unwrap();
    w.write_end().unwrap();
    assert_eq!(w.state(), ScopeState::NestedInfoWithContent);
    let before = written(&w);

    let err = w.write_start(DeltaResourceSet::new()).unwrap_err();
    assert!(matches!(
        err,
        WriterError::InvalidTransitionFromExpandedLink {
            existing: "ResourceSet",
            attempted: "DeltaResourceSet",
            ..
        }
    ));
    assert_eq!(written(&w), before);
}

#[test]
fn test_delta_link_in_nested_resource_set_rejected() {
    let mut w = writer(response(ODataVersion::V401));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    w.write_start(ResourceSet::new()).unwrap();
    let before = written(&w);

    let err = w
        .write_delta_link(DeltaLink::new("Customers('ALFKI')", "Orders", "Orders(1)"))
        .unwrap_err();
    assert!(matches!(
        err,
        WriterError::CannotWriteDeltaWithResourceSetWriter { item: "DeltaLink" }
    ));
    assert_eq!(written(&w), before);
}

#[test]
fn test_late_delta_link_on_nested_set_rejected() {
    let mut w = writer(response(ODataVersion::V401));
    w.write_start(DeltaResourceSet::new()).unwrap();
    let mut customer = Resource::new();
    customer.id = Some("Customers('A')".to_string());
    w.write_start(customer).unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    w.write_start(ResourceSet::new()).unwrap();
    let before = written(&w);

    let err = w.set_delta_link("Customers?$deltatoken=9").unwrap_err();
    assert!(matches!(
        err,
        WriterError::InvalidTransition { from: "ResourceSet", to: "DeltaLink" }
    ));
    assert_eq!(written(&w), before);
    assert!(w.is_failed());
}

#[test]
fn test_nested_set_carrying_delta_link_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    let before = written(&w);

    let mut orders = ResourceSet::new();
    orders.delta_link = Some("Orders?$deltatoken=1".to_string());
    let err = w.write_start(orders).unwrap_err();
    assert!(matches!(err, WriterError::InvalidTransition { to: "DeltaLink", .. }));
    assert_eq!(written(&w), before);
}

#[test]
fn test_deep_insert_after_single_binding_rejected() {
    let mut w = writer(WriterSettings::request(ODataVersion::V401));
    w.write_start(Resource::new()).unwrap();
    w.write_start(NestedResourceInfo::new("Orders")).unwrap();
    w.write_entity_reference_link(EntityReferenceLink::new("Orders(1)")).unwrap();
    let before = written(&w);

    let err = w.write_start(ResourceSet::new()).unwrap_err();
    assert!(matches!(
        err,
        WriterError::NestedResourceInfoCardinalityMismatch {
            expected: "single-valued",
            attempted: "ResourceSet",
            ..
        }
    ));
    assert_eq!(written(&w), before);
}

#[test]
fn test_nested_content_on_401_deleted_resource() {
    let mut w = writer(response(ODataVersion::V401));
    w.write_start(DeltaResourceSet::new()).unwrap();
    let mut removed = DeletedResource::new(DeletionReason::Deleted);
    removed.id = Some("Customers('A')".to_string());
    w.write_start(removed).unwrap();
    w.write_start(NestedResourceInfo::single("Manager")).unwrap();
    w.write_start(ResourceBuilder::new().property("Name", "x").build()).unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"@context":"http://host/service/$metadata#Customers/$delta","value":[{"@removed":{"reason":"deleted"},"@id":"Customers('A')","Manager":{"Name":"x"}}]}"#
    );
}

#[test]
fn test_deleted_resource_gets_no_computed_navigation_links() {
    let model = customers_model();
    let settings = response(ODataVersion::V401).with_metadata_level(MetadataLevel::Full);
    let mut w = writer(settings).with_schema(&model);
    w.write_start(DeltaResourceSet::new()).unwrap();
    w.write_start(
        DeletedResourceBuilder::new(DeletionReason::Deleted)
            .property("CustomerID", "ALFKI")
            .build(),
    )
    .unwrap();
    w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();
    w.write_end().unwrap();

    let json = output(w);
    assert!(json.contains(r#""@removed":{"reason":"deleted"}"#));
    assert!(!json.contains("navigationLink"));
    assert!(!json.contains("associationLink"));
}

#[test]
fn test_writer_poisoned_after_error() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(ResourceSet::new()).unwrap();
    assert!(w.write_start(PropertyInfo::new("Name")).is_err());
    assert!(w.is_failed());
    assert!(matches!(w.write_end().unwrap_err(), WriterError::WriterInErrorState));
    assert!(matches!(w.flush().unwrap_err(), WriterError::WriterInErrorState));
}

#[test]
fn test_completed_writer_accepts_nothing() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(ResourceSet::new()).unwrap();
    w.write_end().unwrap();
    let err = w.write_start(ResourceSet::new()).unwrap_err();
    assert!(matches!(err, WriterError::InvalidTransition { from: "Completed", .. }));
}

#[test]
fn test_max_nesting_depth() {
    let settings = response(ODataVersion::V4).with_max_nesting_depth(2);
    let mut w = writer(settings);
    w.write_start(ResourceSet::new()).unwrap();
    w.write_start(Resource::new()).unwrap();
    assert_eq!(w.depth(), 2);
    let err = w
        .write_start(NestedResourceInfo::collection("Orders"))
        .unwrap_err();
    assert!(matches!(err, WriterError::MaxNestingDepthExceeded { max: 2 }));
}

#[test]
fn test_response_requires_service_root_and_source() {
    let mut w = writer(WriterSettings::response(ODataVersion::V4));
    assert!(matches!(
        w.write_start(ResourceSet::new()).unwrap_err(),
        WriterError::MetadataDocumentUriMissing
    ));

    let mut w: TestWriter<'_> = PayloadWriter::new(JsonTokenWriter::new(Vec::new()), response(ODataVersion::V4));
    assert!(matches!(
        w.write_start(ResourceSet::new()).unwrap_err(),
        WriterError::NavigationSourceMissing { item: "ResourceSet" }
    ));
}

#[test]
fn test_select_expand_projection_in_context() {
    let select = SelectExpand::new()
        .select("CustomerID")
        .expand("Orders", SelectExpand::new().select("OrderID"));
    let mut w = writer(response(ODataVersion::V401).with_select_expand(select));
    w.write_start(ResourceSet::new()).unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        r#"{"@context":"http://host/service/$metadata#Customers(CustomerID,Orders(OrderID))","value":[]}"#
    );
}

#[test]
fn test_late_links() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(ResourceSet::new()).unwrap();
    w.write_start(ResourceBuilder::new().property("CustomerID", "ALFKI").build())
        .unwrap();
    w.write_end().unwrap();
    w.set_next_link("Customers?$skiptoken=1").unwrap();
    w.set_delta_link("Customers?$deltatoken=9").unwrap();
    w.write_end().unwrap();
    assert_eq!(
        output(w),
        concat!(
            r#"{"@odata.context":"http://host/service/$metadata#Customers","value":[{"CustomerID":"ALFKI"}],"#,
            r#""@odata.nextLink":"Customers?$skiptoken=1","@odata.deltaLink":"Customers?$deltatoken=9"}"#
        )
    );
}

#[test]
fn test_late_link_outside_set_rejected() {
    let mut w = writer(response(ODataVersion::V4));
    w.write_start(Resource::new()).unwrap();
    let err = w.set_next_link("Customers?$skiptoken=1").unwrap_err();
    assert!(matches!(err, WriterError::InvalidTransition { to: "NextLink", .. }));
}

#[test]
fn test_flush_does_not_change_output() {
    let mut plain = writer(response(ODataVersion::V4));
    write_mixed_delta(&mut plain).unwrap();

    let mut flushed = writer(response(ODataVersion::V4));
    flushed.flush().unwrap();
    flushed.write_start(delta_set(Some(5), None)).unwrap();
    flushed.flush().unwrap();
    flushed.flush().unwrap();
    assert_eq!(flushed.state(), ScopeState::DeltaResourceSet);
    flushed.write_end().unwrap();
    flushed.flush().unwrap();

    assert_eq!(output(plain), MIXED_DELTA_40);
    assert_eq!(
        output(flushed),
        r#"{"@odata.context":"http://host/service/$metadata#Customers/$delta","@odata.count":5,"value":[]}"#
    );
}

// =============================================================================
// ANNOTATION PREFIXES
// =============================================================================

fn collect_keys(value: &Value, keys: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                keys.push(key.clone());
                collect_keys(child, keys);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_keys(item, keys)),
        _ => {}
    }
}

fn arb_version() -> impl Strategy<Value = ODataVersion> {
    prop_oneof![Just(ODataVersion::V4), Just(ODataVersion::V401)]
}

fn arb_level() -> impl Strategy<Value = MetadataLevel> {
    prop_oneof![
        Just(MetadataLevel::None),
        Just(MetadataLevel::Minimal),
        Just(MetadataLevel::Full)
    ]
}

proptest! {
    #[test]
    fn test_annotation_prefixes_never_mixed(
        version in arb_version(),
        level in arb_level(),
        keys in proptest::collection::vec("[A-Z]{1,5}", 0..6),
        count in proptest::option::of(0i64..1000),
    ) {
        let model = customers_model();
        let settings = response(version).with_metadata_level(level);
        let mut w = writer(settings).with_schema(&model);

        w.write_start(delta_set(count, Some("Customers?$deltatoken=1"))).unwrap();
        for (i, key) in keys.iter().enumerate() {
            if i % 2 == 0 {
                w.write_start(ResourceBuilder::new().property("CustomerID", key.as_str()).build()).unwrap();
                w.write_start(NestedResourceInfo::collection("Orders")).unwrap();
                w.write_end().unwrap();
            } else {
                w.write_start(
                    DeletedResourceBuilder::new(DeletionReason::Changed)
                        .property("CustomerID", key.as_str())
                        .build(),
                ).unwrap();
            }
            w.write_end().unwrap();
        }
        w.write_end().unwrap();

        let parsed: Value = serde_json::from_str(&output(w)).unwrap();
        prop_assert!(parsed["value"].is_array());
        let mut names = Vec::new();
        collect_keys(&parsed, &mut names);
        for name in names.iter().filter(|n| n.contains('@')) {
            let annotation = &name[name.find('@').unwrap()..];
            match version {
                ODataVersion::V4 => prop_assert!(annotation.starts_with("@odata."), "{name}"),
                ODataVersion::V401 => prop_assert!(!annotation.starts_with("@odata."), "{name}"),
            }
        }
    }

    #[test]
    fn test_flush_positions_do_not_change_output(flushes in proptest::collection::vec(any::<bool>(), 16)) {
        let mut plain = writer(response(ODataVersion::V4));
        write_mixed_delta(&mut plain).unwrap();

        let mut flushed = writer(response(ODataVersion::V4));
        let mut step = 0;
        let mut maybe_flush = |w: &mut TestWriter<'_>| {
            if flushes[step % flushes.len()] {
                w.flush().unwrap();
                w.flush().unwrap();
            }
            step += 1;
        };
        maybe_flush(&mut flushed);
        flushed.write_start(delta_set(Some(5), Some("Customers?$expand=Orders&$deltatoken=8015"))).unwrap();
        maybe_flush(&mut flushed);
        flushed.write_start(
            ResourceBuilder::new()
                .id("Customers('BOTTM')")
                .property("ContactName", "Susan Halvenstern")
                .build(),
        ).unwrap();
        maybe_flush(&mut flushed);
        flushed.write_end().unwrap();
        maybe_flush(&mut flushed);
        flushed.write_delta_link(DeltaDeletedLink::new("Customers('ALFKI')", "Orders", "Orders('10643')")).unwrap();
        maybe_flush(&mut flushed);
        flushed.write_delta_link(DeltaLink::new("Customers('BOTTM')", "Orders", "Orders('10645')")).unwrap();
        maybe_flush(&mut flushed);
        flushed.write_start(
            ResourceBuilder::new()
                .id("Orders(10643)")
                .serialization_info(SerializationInfo::entity_set("Orders", "NS.Order"))
                .build(),
        ).unwrap();
        maybe_flush(&mut flushed);
        flushed.write_start(NestedResourceInfo::single("ShippingAddress")).unwrap();
        maybe_flush(&mut flushed);
        flushed.write_start(
            ResourceBuilder::new()
                .property("Street", "23 Tsawassen Blvd.")
                .property("City", "Tsawassen")
                .property("Region", "BC")
                .property("PostalCode", "T2F 8M4")
                .build(),
        ).unwrap();
        maybe_flush(&mut flushed);
        flushed.write_end().unwrap();
        maybe_flush(&mut flushed);
        flushed.write_end().unwrap();
        maybe_flush(&mut flushed);
        flushed.write_end().unwrap();
        maybe_flush(&mut flushed);
        flushed.write_start(
            DeletedResourceBuilder::new(DeletionReason::Deleted)
                .id("Customers('ANTON')")
                .build(),
        ).unwrap();
        maybe_flush(&mut flushed);
        flushed.write_end().unwrap();
        maybe_flush(&mut flushed);
        flushed.write_end().unwrap();
        maybe_flush(&mut flushed);

        prop_assert_eq!(output(flushed), output(plain));
    }
}

// =============================================================================
// ASYNC SURFACE
// =============================================================================

async fn write_async<W: AsyncWrite + Unpin>(w: &mut AsyncPayloadWriter<'_, W>) -> Result<(), WriterError> {
    w.write_start(delta_set(Some(5), Some("Customers?$expand=Orders&$deltatoken=8015")))
        .await?;
    w.write_start(
        ResourceBuilder::new()
            .id("Customers('BOTTM')")
            .property("ContactName", "Susan Halvenstern")
            .build(),
    )
    .await?;
    w.write_end().await?;
    w.write_delta_link(DeltaDeletedLink::new("Customers('ALFKI')", "Orders", "Orders('10643')"))
        .await?;
    w.write_delta_link(DeltaLink::new("Customers('BOTTM')", "Orders", "Orders('10645')"))
        .await?;
    w.write_start(
        ResourceBuilder::new()
            .id("Orders(10643)")
            .serialization_info(SerializationInfo::entity_set("Orders", "NS.Order"))
            .build(),
    )
    .await?;
    w.write_start(NestedResourceInfo::single("ShippingAddress")).await?;
    w.write_start(
        ResourceBuilder::new()
            .property("Street", "23 Tsawassen Blvd.")
            .property("City", "Tsawassen")
            .property("Region", "BC")
            .property("PostalCode", "T2F 8M4")
            .build(),
    )
    .await?;
    w.write_end().await?;
    w.write_end().await?;
    w.write_end().await?;
    w.write_start(
        DeletedResourceBuilder::new(DeletionReason::Deleted)
            .id("Customers('ANTON')")
            .build(),
    )
    .await?;
    w.write_end().await?;
    w.write_end().await?;
    w.flush().await
}

#[tokio::test]
async fn test_async_output_matches_sync() {
    for threshold in [0, 64, usize::MAX] {
        let mut w = AsyncPayloadWriter::new(Vec::new(), response(ODataVersion::V4))
            .for_navigation_source("Customers")
            .with_flush_threshold(threshold);
        write_async(&mut w).await.unwrap();
        assert_eq!(w.state(), ScopeState::Completed);
        let bytes = w.into_inner();
        assert_eq!(String::from_utf8(bytes).unwrap(), MIXED_DELTA_40);
    }
}

#[tokio::test]
async fn test_async_buffers_below_threshold() {
    let mut w = AsyncPayloadWriter::new(Vec::new(), response(ODataVersion::V4))
        .for_navigation_source("Customers");
    w.write_start(DeltaResourceSet::new()).await.unwrap();
    assert!(w.get_ref().is_empty());
    assert!(w.buffered() > 0);
    w.flush().await.unwrap();
    assert_eq!(w.buffered(), 0);
    assert!(!w.get_ref().is_empty());
}

#[tokio::test]
async fn test_async_cancellation_poisons_writer() {
    let token = CancellationToken::new();
    token.cancel();
    let mut w = AsyncPayloadWriter::new(Vec::new(), response(ODataVersion::V4))
        .for_navigation_source("Customers")
        .with_cancellation(token)
        .with_flush_threshold(0);

    let err = w.write_start(DeltaResourceSet::new()).await.unwrap_err();
    assert!(matches!(err, WriterError::Cancelled));
    assert!(w.is_failed());
    assert!(matches!(w.write_end().await.unwrap_err(), WriterError::WriterInErrorState));
    assert!(w.get_ref().is_empty());
}

#[tokio::test]
async fn test_async_validation_error_does_not_drain() {
    let mut w = AsyncPayloadWriter::new(Vec::new(), response(ODataVersion::V4))
        .for_navigation_source("Customers")
        .with_flush_threshold(0);
    w.write_start(ResourceSet::new()).await.unwrap();
    let drained = w.get_ref().len();
    let err = w
        .write_start(DeletedResource::new(DeletionReason::Deleted))
        .await
        .unwrap_err();
    assert!(matches!(err, WriterError::CannotWriteDeltaWithResourceSetWriter { .. }));
    assert_eq!(w.get_ref().len(), drained);
}

/// Output that never accepts bytes.
struct Stalled;

impl AsyncWrite for Stalled {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Pending
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

#[tokio::test]
async fn test_async_dropped_call_abandons_writer() {
    let mut w = AsyncPayloadWriter::new(Stalled, response(ODataVersion::V4))
        .for_navigation_source("Customers")
        .with_flush_threshold(0);

    tokio::select! {
        biased;
        _ = w.write_start(DeltaResourceSet::new()) => panic!("stalled output completed"),
        _ = std::future::ready(()) => {}
    }

    let err = w.write_end().await.unwrap_err();
    assert!(matches!(err, WriterError::WriterInErrorState));
    assert!(w.is_failed());
}
