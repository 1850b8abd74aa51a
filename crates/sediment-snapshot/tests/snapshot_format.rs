//! Integration tests for the layer snapshot format

use sediment_snapshot::{
    FieldTag, FieldValue, LayerSnapshot, MethodId, MethodRecord, MethodTag, ProvenanceFields,
    SnapshotError, TypeId, TypeRecord, TypeTag, CONSTRUCTOR_NAME,
};

fn wrapped_member_fields(class: &str, name: &str, args: &[&str]) -> ProvenanceFields {
    ProvenanceFields::new()
        .with(FieldTag::WrappedMemberClass, FieldValue::String(class.into()))
        .unwrap()
        .with(FieldTag::WrappedMemberName, FieldValue::String(name.into()))
        .unwrap()
        .with(
            FieldTag::WrappedMemberArguments,
            FieldValue::StringList(args.iter().map(|s| s.to_string()).collect()),
        )
        .unwrap()
}

fn layer_with_every_kind() -> LayerSnapshot {
    let mut layer = LayerSnapshot::new("ext-1");

    layer
        .push_type(TypeRecord::plain(TypeId::new(0), "com.example.Foo"))
        .unwrap();
    layer
        .push_type(TypeRecord {
            id: TypeId::new(1),
            name: "jdk.internal.reflect.GeneratedSerializationConstructorAccessor3".into(),
            tag: TypeTag::GeneratedSerialization,
            fields: ProvenanceFields::new()
                .with(
                    FieldTag::RawDeclaringClass,
                    FieldValue::String("com.example.Foo".into()),
                )
                .unwrap()
                .with(
                    FieldTag::RawTargetConstructorClass,
                    FieldValue::String("java.lang.Object".into()),
                )
                .unwrap(),
        })
        .unwrap();
    layer
        .push_type(TypeRecord {
            id: TypeId::new(2),
            name: "com.example.$Proxy$$StableName0".into(),
            tag: TypeTag::Proxy,
            fields: ProvenanceFields::new(),
        })
        .unwrap();

    layer
        .push_method(MethodRecord {
            id: MethodId::new(0),
            owner: TypeId::new(0),
            name: CONSTRUCTOR_NAME.into(),
            parameter_types: vec!["int".into()],
            tag: MethodTag::None,
            fields: ProvenanceFields::new(),
        })
        .unwrap();
    layer
        .push_method(MethodRecord {
            id: MethodId::new(1),
            owner: TypeId::new(0),
            name: "factory".into(),
            parameter_types: vec!["int".into()],
            tag: MethodTag::Factory,
            fields: ProvenanceFields::new()
                .with(FieldTag::TargetConstructor, FieldValue::Id(0))
                .unwrap()
                .with(FieldTag::ThrowAllocatedObject, FieldValue::Bool(true))
                .unwrap()
                .with(FieldTag::InstantiatedType, FieldValue::Id(0))
                .unwrap(),
        })
        .unwrap();
    layer
        .push_method(MethodRecord {
            id: MethodId::new(2),
            owner: TypeId::new(0),
            name: "invoke_Foo".into(),
            parameter_types: vec!["java.lang.Object[]".into()],
            tag: MethodTag::ReflectionExpandSignature,
            fields: wrapped_member_fields("com.example.Foo", CONSTRUCTOR_NAME, &["int"]),
        })
        .unwrap();
    layer
        .push_method(MethodRecord {
            id: MethodId::new(3),
            owner: TypeId::new(0),
            name: "entry_stub".into(),
            parameter_types: vec![],
            tag: MethodTag::CEntryPointStub,
            fields: ProvenanceFields::new()
                .with(FieldTag::OriginalMethodId, FieldValue::Id(1))
                .unwrap()
                .with(FieldTag::NotAsPublished, FieldValue::Bool(false))
                .unwrap(),
        })
        .unwrap();
    layer
}

#[test]
fn test_file_round_trip() {
    let layer = layer_with_every_kind();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ext-1.layer");

    layer.to_file(&path).unwrap();
    let loaded = LayerSnapshot::from_file(&path).unwrap();

    assert_eq!(loaded.name(), "ext-1");
    assert_eq!(loaded.types(), layer.types());
    assert_eq!(loaded.methods(), layer.methods());
    assert!(loaded.check_references().is_ok());
}

#[test]
fn test_fields_keep_write_order() {
    let bytes = layer_with_every_kind().encode().unwrap();
    let loaded = LayerSnapshot::decode(&bytes).unwrap();

    let factory = loaded.method_record(MethodId::new(1)).unwrap();
    let tags: Vec<_> = factory.fields.tags().collect();
    assert_eq!(tags, MethodTag::Factory.required_fields());
}

#[test]
fn test_none_records_carry_no_fields() {
    let bytes = layer_with_every_kind().encode().unwrap();
    let loaded = LayerSnapshot::decode(&bytes).unwrap();

    for record in loaded.types() {
        if record.tag == TypeTag::None {
            assert!(record.fields.is_empty());
        }
    }
    for record in loaded.methods() {
        if record.tag == MethodTag::None {
            assert!(record.fields.is_empty());
        }
    }
}

#[test]
fn test_corrupted_payload_fails_checksum() {
    let mut bytes = layer_with_every_kind().encode().unwrap();
    // First byte of the metadata segment data: header (36) + count (4) + segment header (12)
    bytes[52] ^= 0x55;
    assert!(matches!(
        LayerSnapshot::decode(&bytes),
        Err(SnapshotError::ChecksumMismatch)
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = LayerSnapshot::from_file(dir.path().join("absent.layer"));
    assert!(matches!(result, Err(SnapshotError::Io(_))));
}

#[test]
fn test_json_dump_uses_wire_names() {
    let layer = layer_with_every_kind();
    let json = serde_json::to_value(&layer).unwrap();

    assert_eq!(json["name"], "ext-1");
    assert_eq!(json["types"][1]["tag"], "GENERATED_SERIALIZATION");
    assert_eq!(json["methods"][1]["fields"][0][0], "target_constructor");
    assert_eq!(json["methods"][1]["fields"][0][1], 0);
}
