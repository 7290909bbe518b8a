//! Linked methods

use crate::types::id::TypeId;
use crate::types::member::{MethodBody, MethodDef, Signature};
use crate::types::metadata::MemberId;
use crate::types::modifiers::{MemberModifiers, Visibility};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// A method after linking: its slot is fixed, its body may still be pending
///
/// A method without a body is a placeholder until conversion supplies one;
/// the body is set at most once.
pub struct MethodImpl {
    declaring: TypeId,
    declaring_name: Arc<str>,
    id: MemberId,
    name: Arc<str>,
    signature: Signature,
    modifiers: MemberModifiers,
    slot: Option<u16>,
    body: OnceCell<MethodBody>,
}

impl MethodImpl {
    pub(crate) fn new(
        declaring: TypeId,
        declaring_name: Arc<str>,
        id: MemberId,
        def: &MethodDef,
        slot: Option<u16>,
    ) -> Self {
        Self {
            declaring,
            declaring_name,
            id,
            name: def.name.clone(),
            signature: def.signature.clone(),
            modifiers: def.modifiers,
            slot,
            body: def.body.clone().map(OnceCell::with_value).unwrap_or_default(),
        }
    }

    /// Id of the declaring type
    pub fn declaring_type(&self) -> TypeId {
        self.declaring
    }

    /// Name of the declaring type
    pub fn declaring_name(&self) -> &str {
        &self.declaring_name
    }

    /// Declaration index within its category
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Modifiers
    pub fn modifiers(&self) -> MemberModifiers {
        self.modifiers
    }

    /// Dispatch (or static table) slot; `None` for hosted-only methods
    pub fn slot(&self) -> Option<u16> {
        self.slot
    }

    /// Executable body, once known
    pub fn body(&self) -> Option<&MethodBody> {
        self.body.get()
    }

    /// True while the method still waits for a body
    pub fn is_placeholder(&self) -> bool {
        self.body.get().is_none() && !self.is_abstract()
    }

    /// Replace the placeholder with a body; returns false if one was already set
    pub fn resolve_body(&self, body: MethodBody) -> bool {
        self.body.set(body).is_ok()
    }

    /// True for abstract methods
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(MemberModifiers::ABSTRACT)
    }

    /// True for methods that may not be overridden
    pub fn is_final_or_native(&self) -> bool {
        self.modifiers
            .intersects(MemberModifiers::FINAL | MemberModifiers::NATIVE)
    }

    /// True for methods only present on the build host
    pub fn is_hosted(&self) -> bool {
        self.modifiers.contains(MemberModifiers::HOSTED)
    }

    /// Member visibility
    pub fn visibility(&self) -> Visibility {
        self.modifiers.visibility()
    }

    /// Same name and signature
    pub fn matches(&self, name: &str, signature: &Signature) -> bool {
        &*self.name == name && &self.signature == signature
    }
}

impl fmt::Debug for MethodImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodImpl")
            .field("method", &format_args!("{}.{}{}", self.declaring_name, self.name, self.signature))
            .field("slot", &self.slot)
            .field("placeholder", &self.is_placeholder())
            .finish()
    }
}

impl fmt::Display for MethodImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.declaring_name, self.name, self.signature)
    }
}
