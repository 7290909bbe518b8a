//! Instance and static layout through the linker

use std::sync::Arc;
use tessel_linker::layout::{StaticSection, StaticStorage};
use tessel_linker::{
    ConstantValue, FieldDef, FieldType, GlobalTableKind, LinkError, Linker, LinkerOptions, MemberModifiers,
    Namespace, TypeDefinition, TypeModifiers, TypeState, WordSize,
};

fn setup(word: WordSize) -> (Arc<Linker>, Arc<Namespace>) {
    let linker = Linker::bootstrap(LinkerOptions::with_word_size(word)).unwrap();
    let ns = linker.create_namespace("app");
    (linker, ns)
}

#[test]
fn test_reference_after_unaligned_supertype() {
    let (linker, ns) = setup(WordSize::W64);
    let a = linker
        .complete_definition(
            &ns,
            TypeDefinition::class("app.A")
                .extends("Object")
                .field(FieldDef::new("a", FieldType::Int)),
        )
        .unwrap();
    let b = linker
        .complete_definition(
            &ns,
            TypeDefinition::class("app.B")
                .extends("app.A")
                .field(FieldDef::new("r", FieldType::reference("app.A")))
                .field(FieldDef::new("b", FieldType::Int)),
        )
        .unwrap();

    assert_eq!(a.instance_size(), 4);
    assert_eq!(b.instance_size(), 8 + 8 + 4);
    let layout = &b.linked().unwrap().instance;
    assert_eq!(layout.field("r").unwrap().offset, 8);
    assert_eq!(layout.oop_map.indices().collect::<Vec<_>>(), vec![1]);
    assert_eq!(layout.data_map.byte_len(), 20);
}

#[test]
fn test_bitmaps_extend_supertype() {
    let (linker, ns) = setup(WordSize::W32);
    let mut previous = linker.root().unwrap();
    let shapes: [&[FieldType]; 4] = [
        &[FieldType::reference("Object"), FieldType::Byte],
        &[FieldType::Short, FieldType::reference("Object")],
        &[FieldType::Double],
        &[FieldType::Char, FieldType::Address, FieldType::reference("Object")],
    ];
    for (depth, fields) in shapes.iter().enumerate() {
        let name = format!("app.L{}", depth);
        let mut def = TypeDefinition::class(&name).extends(previous.name());
        for (i, ty) in fields.iter().enumerate() {
            def = def.field(FieldDef::new(&format!("f{}", i), ty.clone()));
        }
        let ty = linker.complete_definition(&ns, def).unwrap();

        let sup = &previous.linked().unwrap().instance;
        let own = &ty.linked().unwrap().instance;
        assert!(own.size >= sup.size);
        assert!(sup.oop_map.is_subset_of(&own.oop_map));
        for index in 0..(sup.size as usize / WordSize::W32.bytes()) {
            assert_eq!(sup.oop_map.is_set(index), own.oop_map.is_set(index));
        }
        assert!(sup.data_map.is_prefix_of(&own.data_map));
        assert_eq!(own.data_map.byte_len(), own.size as usize);
        previous = ty;
    }
}

#[test]
fn test_static_sections_are_ordered() {
    let (linker, ns) = setup(WordSize::W32);
    let ty = linker
        .complete_definition(
            &ns,
            TypeDefinition::class("app.Config")
                .extends("Object")
                .static_field(FieldDef::new("count", FieldType::Int))
                .static_field(FieldDef::new("LIMIT", FieldType::Long).with_constant(ConstantValue::Long(9)))
                .static_field(FieldDef::new("name", FieldType::reference("String")))
                .static_field(FieldDef::new("total", FieldType::Double))
                .static_field(FieldDef::new("owner", FieldType::reference("Object"))),
        )
        .unwrap();

    let statics = &ty.linked().unwrap().statics;
    let slot = |name: &str| match statics.field(name).unwrap().storage {
        StaticStorage::Slot(s) => s,
        other => panic!("{} stored as {:?}", name, other),
    };
    assert_eq!(slot("name"), 0);
    assert_eq!(slot("owner"), 1);
    assert_eq!(slot("count"), 2);
    assert_eq!(slot("total"), 3);
    assert_eq!(slot("LIMIT"), 5);
    assert_eq!(statics.size, 7);
    assert_eq!(statics.ref_prefix, 2);
    assert_eq!(statics.field("LIMIT").unwrap().section, StaticSection::Constant);
    assert!(ty.modifiers().contains(TypeModifiers::EAGER_REIFICATION));
}

#[test]
fn test_system_image_constants_are_inlined() {
    let (linker, ns) = setup(WordSize::W64);
    let ty = linker
        .complete_definition(
            &ns,
            TypeDefinition::class("app.Limits")
                .extends("Object")
                .with_modifiers(TypeModifiers::PUBLIC | TypeModifiers::SYSTEM_IMAGE)
                .static_field(FieldDef::new("MAX", FieldType::Int).with_constant(ConstantValue::Int(10))),
        )
        .unwrap();
    let statics = &ty.linked().unwrap().statics;
    assert_eq!(statics.field("MAX").unwrap().storage, StaticStorage::Inlined);
    assert_eq!(statics.size, 0);
    assert!(!ty.modifiers().contains(TypeModifiers::EAGER_REIFICATION));
    assert!(!ty.needs_initialization());
}

#[test]
fn test_global_statics_are_registered() {
    let (linker, ns) = setup(WordSize::W64);
    let ty = linker
        .complete_definition(
            &ns,
            TypeDefinition::class("app.Globals")
                .extends("Object")
                .with_modifiers(TypeModifiers::PUBLIC | TypeModifiers::GLOBAL_STATICS)
                .static_field(FieldDef::new("hits", FieldType::Int))
                .static_field(FieldDef::new("base", FieldType::Address))
                .static_field(FieldDef::new("SEED", FieldType::Long).with_constant(ConstantValue::Long(42))),
        )
        .unwrap();

    let globals = linker.globals();
    let seed = globals.index_of(GlobalTableKind::Int, "app.Globals.SEED").unwrap();
    assert_eq!(globals.get(GlobalTableKind::Int, seed), Some(42));
    assert!(globals.index_of(GlobalTableKind::Address, "app.Globals.base").is_some());
    let statics = &ty.linked().unwrap().statics;
    assert!(matches!(
        statics.field("hits").unwrap().storage,
        StaticStorage::Global(GlobalTableKind::Int, _)
    ));
    assert_eq!(statics.size, 0);
}

#[test]
fn test_mismatched_constant_is_a_format_error() {
    let (linker, ns) = setup(WordSize::W64);
    let err = linker
        .complete_definition(
            &ns,
            TypeDefinition::class("app.Bad")
                .extends("Object")
                .static_field(
                    FieldDef::new("name", FieldType::reference("String"))
                        .with_modifiers(MemberModifiers::FINAL)
                        .with_constant(ConstantValue::Int(1)),
                ),
        )
        .unwrap_err();
    assert!(matches!(err, LinkError::ClassFormat { .. }));
    assert_eq!(ns.find("app.Bad").unwrap().state(), TypeState::Error);
}

#[test]
fn test_text_types_have_no_instance_fields() {
    let (linker, _) = setup(WordSize::W64);
    let bootstrap = linker.registry().bootstrap_namespace().clone();
    for name in ["Object", "String", "ByteString"] {
        assert_eq!(bootstrap.find(name).unwrap().instance_size(), 0);
    }
}
