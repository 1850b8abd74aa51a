//! Entity classifier
//!
//! Pure mapping from a resolved type or method to its synthetic kind tag.
//! Types are matched in a fixed order (generated serialization accessor,
//! lambda, proxy); matching more than one kind is an internal inconsistency.

use crate::error::ProvenanceError;
use crate::universe::{AnalysisMethod, AnalysisType, MethodImpl};
use sediment_snapshot::{MethodTag, TypeTag};

/// Simple-name marker of platform-generated serialization constructor accessors
pub const GENERATED_SERIALIZATION_MARKER: &str = "GeneratedSerializationConstructorAccessor";

/// Fully qualified name prefix used when generating a new accessor
pub const GENERATED_SERIALIZATION_PREFIX: &str =
    "jdk.internal.reflect.GeneratedSerializationConstructorAccessor";

/// Marker separating a lambda class's capturing class from its identity suffix
pub const LAMBDA_MARKER: &str = "$$Lambda";

/// Whether a class name denotes a generated serialization constructor accessor
pub fn is_generated_serialization(name: &str) -> bool {
    let simple = name.rsplit('.').next().unwrap_or(name);
    simple.starts_with(GENERATED_SERIALIZATION_MARKER)
}

/// Split a lambda class name into capturing class and identity suffix
///
/// `com.example.Widget$$Lambda/0x1` splits into `com.example.Widget` and `/0x1`.
pub fn lambda_name_parts(name: &str) -> Option<(&str, &str)> {
    let at = name.find(LAMBDA_MARKER)?;
    let capturing = &name[..at];
    if capturing.is_empty() {
        return None;
    }
    Some((capturing, &name[at + LAMBDA_MARKER.len()..]))
}

/// Whether a type is a lambda-synthesized class
pub fn is_lambda(ty: &AnalysisType) -> bool {
    ty.capturing_class.is_some() || lambda_name_parts(&ty.name).is_some()
}

/// Classify a type
pub fn classify_type(ty: &AnalysisType) -> Result<TypeTag, ProvenanceError> {
    let candidates = [
        (is_generated_serialization(&ty.name), TypeTag::GeneratedSerialization),
        (is_lambda(ty), TypeTag::Lambda),
        (ty.proxy_renamed, TypeTag::Proxy),
    ];
    let mut matched = candidates.iter().filter(|(hit, _)| *hit).map(|(_, tag)| *tag);

    match (matched.next(), matched.next()) {
        (None, _) => Ok(TypeTag::None),
        (Some(tag), None) => Ok(tag),
        (Some(first), Some(second)) => Err(ProvenanceError::AmbiguousClassification {
            name: ty.name.clone(),
            first: first.name(),
            second: second.name(),
        }),
    }
}

/// Classify a method by its underlying implementation
pub fn classify_method(method: &AnalysisMethod) -> MethodTag {
    match method.implementation {
        MethodImpl::Declared => MethodTag::None,
        MethodImpl::Factory { .. } => MethodTag::Factory,
        MethodImpl::CEntryPointStub { .. } => MethodTag::CEntryPointStub,
        MethodImpl::ReflectionExpandSignature { .. } => MethodTag::ReflectionExpandSignature,
        MethodImpl::JniCallVariantWrapper { .. } => MethodTag::JniCallVariantWrapper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::AnalysisUniverse;

    #[test]
    fn test_serialization_accessor_names() {
        assert!(is_generated_serialization(
            "jdk.internal.reflect.GeneratedSerializationConstructorAccessor12"
        ));
        assert!(is_generated_serialization("GeneratedSerializationConstructorAccessor1"));
        assert!(!is_generated_serialization("com.example.GeneratedSerializationHelper"));
        assert!(!is_generated_serialization("com.example.Foo"));
    }

    #[test]
    fn test_lambda_name_parts() {
        assert_eq!(
            lambda_name_parts("com.example.Widget$$Lambda/0x0000000800c0a000"),
            Some(("com.example.Widget", "/0x0000000800c0a000"))
        );
        assert_eq!(lambda_name_parts("com.example.Widget"), None);
        assert_eq!(lambda_name_parts("$$Lambda/0x1"), None);
    }

    #[test]
    fn test_classify_types() {
        let mut universe = AnalysisUniverse::new();
        let plain = universe.add_type("com.example.Foo");
        let accessor =
            universe.add_type("jdk.internal.reflect.GeneratedSerializationConstructorAccessor3");
        let lambda = universe.add_type("com.example.Widget$$Lambda/0x1");
        let proxy = universe.add_proxy_type("com.sun.proxy.$Proxy$$StableName7");

        let tag = |h| classify_type(universe.ty(h).unwrap()).unwrap();
        assert_eq!(tag(plain), TypeTag::None);
        assert_eq!(tag(accessor), TypeTag::GeneratedSerialization);
        assert_eq!(tag(lambda), TypeTag::Lambda);
        assert_eq!(tag(proxy), TypeTag::Proxy);
    }

    #[test]
    fn test_classification_is_repeatable() {
        let mut universe = AnalysisUniverse::new();
        let lambda = universe.add_type("com.example.Widget$$Lambda/0x1");
        let ty = universe.ty(lambda).unwrap();
        let first = classify_type(ty).unwrap();
        for _ in 0..10 {
            assert_eq!(classify_type(ty).unwrap(), first);
        }
    }

    #[test]
    fn test_ambiguous_type_is_rejected() {
        let mut universe = AnalysisUniverse::new();
        let both = universe.add_proxy_type("com.example.Widget$$Lambda/0x1");
        let result = classify_type(universe.ty(both).unwrap());
        assert!(matches!(
            result,
            Err(ProvenanceError::AmbiguousClassification { first: "LAMBDA", second: "PROXY", .. })
        ));
    }

    #[test]
    fn test_classify_methods() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        let ctor = universe.add_constructor(foo, vec!["int".into()]).unwrap();
        let factory = universe
            .add_method(
                foo,
                "factory",
                vec!["int".into()],
                MethodImpl::Factory {
                    target_constructor: ctor,
                    instantiated_type: foo,
                    throw_allocated_object: false,
                },
            )
            .unwrap();
        let expander = universe
            .add_method(
                foo,
                "invoke",
                vec!["java.lang.Object[]".into()],
                MethodImpl::ReflectionExpandSignature { member: ctor },
            )
            .unwrap();
        let jni = universe
            .add_method(foo, "call", vec![], MethodImpl::JniCallVariantWrapper { member: ctor })
            .unwrap();
        let stub = universe
            .add_method(foo, "entry", vec![], MethodImpl::CEntryPointStub { not_published: true })
            .unwrap();

        let tag = |h| classify_method(universe.method(h).unwrap());
        assert_eq!(tag(ctor), MethodTag::None);
        assert_eq!(tag(factory), MethodTag::Factory);
        assert_eq!(tag(expander), MethodTag::ReflectionExpandSignature);
        assert_eq!(tag(jni), MethodTag::JniCallVariantWrapper);
        assert_eq!(tag(stub), MethodTag::CEntryPointStub);
    }
}
