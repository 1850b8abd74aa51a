//! Analysis universe
//!
//! The set of types and methods the analysis found reachable, as seen by the
//! snapshot writer and rebuilt by the relinker. Handles are process-local:
//! they index this universe and mean nothing in another process, which is why
//! provenance is never encoded in terms of them.

use crate::classify::LAMBDA_MARKER;
use crate::error::UniverseError;
use rustc_hash::FxHashMap;
use sediment_snapshot::CONSTRUCTOR_NAME;
use std::fmt;

/// Process-local handle of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(u32);

impl TypeHandle {
    /// Index into the universe's type table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Process-local handle of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodHandle(u32);

impl MethodHandle {
    /// Index into the universe's method table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Key a serialization constructor accessor is generated for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerializationKey {
    /// Class being deserialized
    pub declaring_class: String,
    /// Class whose constructor the accessor invokes
    pub target_constructor_class: String,
}

impl SerializationKey {
    /// Create a key from the two class names
    pub fn new(
        declaring_class: impl Into<String>,
        target_constructor_class: impl Into<String>,
    ) -> Self {
        Self {
            declaring_class: declaring_class.into(),
            target_constructor_class: target_constructor_class.into(),
        }
    }
}

impl fmt::Display for SerializationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.declaring_class, self.target_constructor_class)
    }
}

/// Name of a reflective member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberName {
    /// A constructor; constructors have no source name
    Constructor,
    /// A named method
    Named(String),
}

impl MemberName {
    /// Parse the wire form, mapping the sentinel back to `Constructor`
    pub fn from_wire(name: &str) -> Self {
        if name == CONSTRUCTOR_NAME {
            MemberName::Constructor
        } else {
            MemberName::Named(name.to_string())
        }
    }

    /// Wire form, with constructors written as the sentinel
    pub fn as_wire(&self) -> &str {
        match self {
            MemberName::Constructor => CONSTRUCTOR_NAME,
            MemberName::Named(name) => name,
        }
    }
}

/// Cross-process description of a real reflective member
///
/// `(declaring class name, member name or constructor sentinel, parameter
/// type names)`; enough to find the member again in another universe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WrappedMember {
    /// Fully qualified name of the declaring class
    pub declaring_class: String,
    /// Member name
    pub name: MemberName,
    /// Parameter type names in declaration order
    pub parameter_types: Vec<String>,
}

impl fmt::Display for WrappedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.declaring_class,
            self.name.as_wire(),
            self.parameter_types.join(", ")
        )
    }
}

/// A type in the universe
#[derive(Debug, Clone)]
pub struct AnalysisType {
    /// Handle of this type
    pub handle: TypeHandle,
    /// Fully qualified name
    pub name: String,
    /// Renamed by the dynamic proxy substitution
    pub proxy_renamed: bool,
    /// Capturing class, for lambda types bound by the relinker
    pub capturing_class: Option<TypeHandle>,
}

/// What actually implements a method
///
/// Each synthetic variant carries exactly the data its provenance needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodImpl {
    /// Ordinary source-declared method or constructor
    Declared,
    /// Allocation helper standing in for a constructor
    Factory {
        /// Constructor the factory allocates through
        target_constructor: MethodHandle,
        /// Type the factory instantiates
        instantiated_type: TypeHandle,
        /// Whether the allocated object is thrown instead of returned
        throw_allocated_object: bool,
    },
    /// Native entry point call stub; its original method is kept by the registry
    CEntryPointStub {
        /// Stub is not published under the original's name
        not_published: bool,
    },
    /// Reflective signature-expansion wrapper
    ReflectionExpandSignature {
        /// Real member being wrapped
        member: MethodHandle,
    },
    /// Native-interop call variant wrapper
    JniCallVariantWrapper {
        /// Real member being wrapped
        member: MethodHandle,
    },
}

/// A method or constructor in the universe
#[derive(Debug, Clone)]
pub struct AnalysisMethod {
    /// Handle of this method
    pub handle: MethodHandle,
    /// Declaring type
    pub declaring_type: TypeHandle,
    /// Name, `<init>` for constructors
    pub name: String,
    /// Parameter type names in declaration order
    pub parameter_types: Vec<String>,
    /// Underlying implementation
    pub implementation: MethodImpl,
}

impl AnalysisMethod {
    /// Whether this method is a constructor
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }
}

type Signature = (TypeHandle, String, Vec<String>);

/// Types and methods known to one process
#[derive(Debug, Default)]
pub struct AnalysisUniverse {
    types: Vec<AnalysisType>,
    methods: Vec<AnalysisMethod>,
    types_by_name: FxHashMap<String, TypeHandle>,
    methods_by_signature: FxHashMap<Signature, MethodHandle>,
    reflective: FxHashMap<WrappedMember, MethodHandle>,
    lambdas: FxHashMap<(TypeHandle, String), TypeHandle>,
}

impl AnalysisUniverse {
    /// Create an empty universe
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Types =====

    /// Add a type, or return the handle of the type already using the name
    pub fn add_type(&mut self, name: impl Into<String>) -> TypeHandle {
        self.intern_type(name.into(), false)
    }

    /// Add a type renamed by the dynamic proxy substitution
    pub fn add_proxy_type(&mut self, name: impl Into<String>) -> TypeHandle {
        self.intern_type(name.into(), true)
    }

    fn intern_type(&mut self, name: String, proxy_renamed: bool) -> TypeHandle {
        if let Some(&handle) = self.types_by_name.get(&name) {
            return handle;
        }
        let handle = TypeHandle(self.types.len() as u32);
        self.types_by_name.insert(name.clone(), handle);
        self.types.push(AnalysisType {
            handle,
            name,
            proxy_renamed,
            capturing_class: None,
        });
        handle
    }

    /// Add (or find) the lambda type identified by capturing class and suffix
    pub fn add_lambda_type(
        &mut self,
        capturing_class: TypeHandle,
        suffix: &str,
    ) -> Result<TypeHandle, UniverseError> {
        if let Some(handle) = self.lambda_type(capturing_class, suffix) {
            return Ok(handle);
        }
        let capturing = self
            .ty(capturing_class)
            .ok_or(UniverseError::UnknownType(capturing_class))?;
        let name = format!("{}{}{}", capturing.name, LAMBDA_MARKER, suffix);
        if self.types_by_name.contains_key(&name) {
            return Err(UniverseError::NameConflict(name));
        }
        let handle = self.intern_type(name, false);
        self.types[handle.index()].capturing_class = Some(capturing_class);
        self.lambdas.insert((capturing_class, suffix.to_string()), handle);
        Ok(handle)
    }

    /// Bind an already declared type as the lambda of a capturing class
    ///
    /// Rebinding to the same capturing class is a no-op. A proxy type, or a
    /// type already bound to another capturing class, is a name conflict.
    pub fn bind_lambda_type(
        &mut self,
        handle: TypeHandle,
        capturing_class: TypeHandle,
        suffix: &str,
    ) -> Result<(), UniverseError> {
        self.ty(capturing_class)
            .ok_or(UniverseError::UnknownType(capturing_class))?;
        let lambda = self.ty(handle).ok_or(UniverseError::UnknownType(handle))?;
        if lambda.proxy_renamed
            || lambda
                .capturing_class
                .is_some_and(|bound| bound != capturing_class)
        {
            return Err(UniverseError::NameConflict(lambda.name.clone()));
        }
        if let Some(bound) = self.lambda_type(capturing_class, suffix) {
            if bound != handle {
                return Err(UniverseError::NameConflict(lambda.name.clone()));
            }
        }
        self.types[handle.index()].capturing_class = Some(capturing_class);
        self.lambdas.insert((capturing_class, suffix.to_string()), handle);
        Ok(())
    }

    /// Lambda type bound to a capturing class and suffix, if any
    pub fn lambda_type(&self, capturing_class: TypeHandle, suffix: &str) -> Option<TypeHandle> {
        self.lambdas
            .get(&(capturing_class, suffix.to_string()))
            .copied()
    }

    /// Look up a type
    pub fn ty(&self, handle: TypeHandle) -> Option<&AnalysisType> {
        self.types.get(handle.index())
    }

    /// Look up a type by fully qualified name
    pub fn find_type(&self, name: &str) -> Option<TypeHandle> {
        self.types_by_name.get(name).copied()
    }

    /// Every type, in handle order
    pub fn types(&self) -> &[AnalysisType] {
        &self.types
    }

    /// Number of types
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    // ===== Methods =====

    /// Add a method, or return the existing method with the same signature
    ///
    /// An existing method with the same signature but a different
    /// implementation is a conflict.
    pub fn add_method(
        &mut self,
        declaring_type: TypeHandle,
        name: impl Into<String>,
        parameter_types: Vec<String>,
        implementation: MethodImpl,
    ) -> Result<MethodHandle, UniverseError> {
        let name = name.into();
        let owner = self.ty(declaring_type).ok_or(UniverseError::UnknownType(declaring_type))?;
        let signature_text = format!("{}.{}({})", owner.name, name, parameter_types.join(", "));
        self.check_impl_references(&implementation)?;

        let signature = (declaring_type, name, parameter_types);
        if let Some(&existing) = self.methods_by_signature.get(&signature) {
            if self.methods[existing.index()].implementation == implementation {
                return Ok(existing);
            }
            return Err(UniverseError::SignatureConflict(signature_text));
        }

        let handle = MethodHandle(self.methods.len() as u32);
        self.methods_by_signature.insert(signature.clone(), handle);
        let (declaring_type, name, parameter_types) = signature;
        self.methods.push(AnalysisMethod {
            handle,
            declaring_type,
            name,
            parameter_types,
            implementation,
        });
        Ok(handle)
    }

    /// Add a declared constructor
    pub fn add_constructor(
        &mut self,
        declaring_type: TypeHandle,
        parameter_types: Vec<String>,
    ) -> Result<MethodHandle, UniverseError> {
        self.add_method(
            declaring_type,
            CONSTRUCTOR_NAME,
            parameter_types,
            MethodImpl::Declared,
        )
    }

    fn check_impl_references(&self, implementation: &MethodImpl) -> Result<(), UniverseError> {
        match implementation {
            MethodImpl::Declared | MethodImpl::CEntryPointStub { .. } => Ok(()),
            MethodImpl::Factory {
                target_constructor,
                instantiated_type,
                ..
            } => {
                self.method(*target_constructor)
                    .ok_or(UniverseError::UnknownMethod(*target_constructor))?;
                self.ty(*instantiated_type)
                    .ok_or(UniverseError::UnknownType(*instantiated_type))?;
                Ok(())
            }
            MethodImpl::ReflectionExpandSignature { member }
            | MethodImpl::JniCallVariantWrapper { member } => {
                self.method(*member).ok_or(UniverseError::UnknownMethod(*member))?;
                Ok(())
            }
        }
    }

    /// Look up a method
    pub fn method(&self, handle: MethodHandle) -> Option<&AnalysisMethod> {
        self.methods.get(handle.index())
    }

    /// Look up a method by declaring type, name and parameter type names
    pub fn find_method(
        &self,
        declaring_type: TypeHandle,
        name: &str,
        parameter_types: &[String],
    ) -> Option<MethodHandle> {
        self.methods_by_signature
            .get(&(declaring_type, name.to_string(), parameter_types.to_vec()))
            .copied()
    }

    /// Every method, in handle order
    pub fn methods(&self) -> &[AnalysisMethod] {
        &self.methods
    }

    /// Number of methods
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    // ===== Reflection metadata =====

    /// Describe a method as a cross-process member descriptor
    pub fn wrapped_member(&self, handle: MethodHandle) -> Option<WrappedMember> {
        let method = self.method(handle)?;
        let owner = self.ty(method.declaring_type)?;
        Some(WrappedMember {
            declaring_class: owner.name.clone(),
            name: MemberName::from_wire(&method.name),
            parameter_types: method.parameter_types.clone(),
        })
    }

    /// Make a method visible to reflective lookup
    pub fn register_reflective(&mut self, handle: MethodHandle) -> Result<(), UniverseError> {
        let member = self
            .wrapped_member(handle)
            .ok_or(UniverseError::UnknownMethod(handle))?;
        self.reflective.insert(member, handle);
        Ok(())
    }

    /// Find a reflectively registered member by exact descriptor
    pub fn find_reflective(&self, member: &WrappedMember) -> Option<MethodHandle> {
        self.reflective.get(member).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_type_interns_by_name() {
        let mut universe = AnalysisUniverse::new();
        let a = universe.add_type("com.example.Foo");
        let b = universe.add_type("com.example.Foo");
        assert_eq!(a, b);
        assert_eq!(universe.type_count(), 1);
        assert_eq!(universe.find_type("com.example.Foo"), Some(a));
    }

    #[test]
    fn test_add_method_is_idempotent_for_same_impl() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        let a = universe.add_constructor(foo, vec!["int".into()]).unwrap();
        let b = universe.add_constructor(foo, vec!["int".into()]).unwrap();
        assert_eq!(a, b);
        assert_eq!(universe.method_count(), 1);
        assert!(universe.method(a).unwrap().is_constructor());
    }

    #[test]
    fn test_add_method_signature_conflict() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        universe
            .add_method(foo, "run", vec![], MethodImpl::Declared)
            .unwrap();
        let result = universe.add_method(
            foo,
            "run",
            vec![],
            MethodImpl::CEntryPointStub { not_published: true },
        );
        assert!(matches!(result, Err(UniverseError::SignatureConflict(s)) if s == "Foo.run()"));
    }

    #[test]
    fn test_factory_requires_known_handles() {
        let mut universe = AnalysisUniverse::new();
        let foo = universe.add_type("Foo");
        let result = universe.add_method(
            foo,
            "factory",
            vec![],
            MethodImpl::Factory {
                target_constructor: MethodHandle(7),
                instantiated_type: foo,
                throw_allocated_object: false,
            },
        );
        assert!(matches!(result, Err(UniverseError::UnknownMethod(_))));
        assert_eq!(universe.method_count(), 0);
    }

    #[test]
    fn test_constructor_descriptor_uses_sentinel() {
        let mut universe = AnalysisUniverse::new();
        let bar = universe.add_type("Bar");
        let ctor = universe.add_constructor(bar, vec![]).unwrap();
        let member = universe.wrapped_member(ctor).unwrap();
        assert_eq!(member.name, MemberName::Constructor);
        assert_eq!(member.to_string(), "Bar.<init>()");
    }

    #[test]
    fn test_reflective_lookup_is_exact() {
        let mut universe = AnalysisUniverse::new();
        let bar = universe.add_type("Bar");
        let ctor = universe.add_constructor(bar, vec!["int".into()]).unwrap();
        universe.register_reflective(ctor).unwrap();

        let exact = WrappedMember {
            declaring_class: "Bar".into(),
            name: MemberName::Constructor,
            parameter_types: vec!["int".into()],
        };
        assert_eq!(universe.find_reflective(&exact), Some(ctor));

        let wrong_arity = WrappedMember {
            parameter_types: vec![],
            ..exact
        };
        assert_eq!(universe.find_reflective(&wrong_arity), None);
    }

    #[test]
    fn test_lambda_types_keyed_by_capturing_class_and_suffix() {
        let mut universe = AnalysisUniverse::new();
        let widget = universe.add_type("com.example.Widget");
        let a = universe.add_lambda_type(widget, "/0x1").unwrap();
        let b = universe.add_lambda_type(widget, "/0x1").unwrap();
        let c = universe.add_lambda_type(widget, "/0x2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let lambda = universe.ty(a).unwrap();
        assert_eq!(lambda.name, "com.example.Widget$$Lambda/0x1");
        assert_eq!(lambda.capturing_class, Some(widget));
    }

    #[test]
    fn test_bind_declared_lambda_type() {
        let mut universe = AnalysisUniverse::new();
        let widget = universe.add_type("com.example.Widget");
        let lambda = universe.add_type("com.example.Widget$$Lambda/0x1");
        assert_eq!(universe.lambda_type(widget, "/0x1"), None);

        universe.bind_lambda_type(lambda, widget, "/0x1").unwrap();
        universe.bind_lambda_type(lambda, widget, "/0x1").unwrap();
        assert_eq!(universe.lambda_type(widget, "/0x1"), Some(lambda));
        assert_eq!(universe.ty(lambda).unwrap().capturing_class, Some(widget));
        assert_eq!(universe.add_lambda_type(widget, "/0x1").unwrap(), lambda);
    }

    #[test]
    fn test_bind_lambda_type_rejects_other_capturing_class() {
        let mut universe = AnalysisUniverse::new();
        let widget = universe.add_type("com.example.Widget");
        let gadget = universe.add_type("com.example.Gadget");
        let lambda = universe.add_lambda_type(widget, "/0x1").unwrap();
        let proxy = universe.add_proxy_type("$Proxy7");

        let result = universe.bind_lambda_type(lambda, gadget, "/0x1");
        assert!(matches!(result, Err(UniverseError::NameConflict(_))));
        let result = universe.bind_lambda_type(proxy, widget, "/0x9");
        assert!(matches!(result, Err(UniverseError::NameConflict(_))));
        assert_eq!(universe.lambda_type(widget, "/0x9"), None);
    }

    #[test]
    fn test_member_name_wire_form() {
        assert_eq!(MemberName::from_wire("<init>"), MemberName::Constructor);
        assert_eq!(
            MemberName::from_wire("apply"),
            MemberName::Named("apply".to_string())
        );
        assert_eq!(MemberName::Constructor.as_wire(), "<init>");
    }
}
