//! Status vocabularies and the document status transition policy
//!
//! Every status-mutating endpoint validates the requested value against the
//! fixed enumeration of its document kind before touching the store, then asks
//! this module whether the move is allowed for the acting role. GRN writes also
//! get a cascade plan for the parent purchase order.
//!
//! Orders carry two unrelated vocabularies: the flat fulfilment list
//! (`Received/Processed/Dispatched/Delivered`) and the role-keyed lifecycle
//! (`pending/approved/...`). They are kept as separate [`DocumentKind`]s and
//! are never translated into each other.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Document kinds and actor roles
// ============================================================================

/// Kind of document whose status is being changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Customer order, fulfilment vocabulary
    Order,
    /// Customer order, role-keyed lifecycle vocabulary
    OrderLifecycle,
    PurchaseOrder,
    Grn,
    ReturnOrder,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Order,
        DocumentKind::OrderLifecycle,
        DocumentKind::PurchaseOrder,
        DocumentKind::Grn,
        DocumentKind::ReturnOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Order => "order",
            DocumentKind::OrderLifecycle => "order_lifecycle",
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::Grn => "grn",
            DocumentKind::ReturnOrder => "return_order",
        }
    }

    /// Parse a kind from a URL slug; accepts kebab-case and snake_case
    pub fn from_slug(slug: &str) -> Option<Self> {
        let normalized = slug.replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
    }

    /// Human readable label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Order => "Order",
            DocumentKind::OrderLifecycle => "Order",
            DocumentKind::PurchaseOrder => "Purchase order",
            DocumentKind::Grn => "GRN",
            DocumentKind::ReturnOrder => "Return order",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Role of the caller requesting a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Vendor,
    Customer,
    Admin,
    Delivery,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Vendor => "vendor",
            ActorRole::Customer => "customer",
            ActorRole::Admin => "admin",
            ActorRole::Delivery => "delivery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "vendor" => Some(ActorRole::Vendor),
            "customer" => Some(ActorRole::Customer),
            "admin" => Some(ActorRole::Admin),
            "delivery" => Some(ActorRole::Delivery),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Rejections produced by the transition policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Invalid {kind} status '{requested}'. Valid statuses: {}", .valid.join(", "))]
    InvalidStatus {
        kind: DocumentKind,
        requested: String,
        valid: &'static [&'static str],
    },

    #[error("{kind} not found")]
    NotFound { kind: DocumentKind },

    #[error("{kind} is in terminal status '{status}' and is immutable")]
    TerminalStateViolation {
        kind: DocumentKind,
        status: &'static str,
    },

    #[error("Role '{role}' may not move {kind} from '{from}' to '{to}'")]
    NotPermitted {
        kind: DocumentKind,
        from: &'static str,
        to: &'static str,
        role: ActorRole,
    },
}

impl StatusError {
    fn invalid(kind: DocumentKind, requested: &str) -> Self {
        StatusError::InvalidStatus {
            kind,
            requested: requested.to_string(),
            valid: valid_statuses(kind),
        }
    }
}

// ============================================================================
// Vocabularies
// ============================================================================

/// A fixed status enumeration belonging to one document kind
pub trait StatusVocabulary: Sized + Copy + PartialEq + 'static {
    const KIND: DocumentKind;
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn is_terminal(&self) -> bool {
        false
    }

    /// Parse a raw value, rejecting anything outside the enumeration
    fn parse(raw: &str) -> Result<Self, StatusError> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| StatusError::invalid(Self::KIND, raw))
    }
}

/// Order fulfilment status, the vocabulary enforced by the order status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Received,
    Processed,
    Dispatched,
    Delivered,
}

impl StatusVocabulary for OrderStatus {
    const KIND: DocumentKind = DocumentKind::Order;
    const ALL: &'static [Self] = &[
        OrderStatus::Received,
        OrderStatus::Processed,
        OrderStatus::Dispatched,
        OrderStatus::Delivered,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "Received",
            OrderStatus::Processed => "Processed",
            OrderStatus::Dispatched => "Dispatched",
            OrderStatus::Delivered => "Delivered",
        }
    }
}

/// Role-keyed order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderLifecycleStatus {
    Pending,
    Approved,
    Preparing,
    Ready,
    InTransit,
    Delivered,
    Rejected,
    Cancelled,
    Failed,
}

impl StatusVocabulary for OrderLifecycleStatus {
    const KIND: DocumentKind = DocumentKind::OrderLifecycle;
    const ALL: &'static [Self] = &[
        OrderLifecycleStatus::Pending,
        OrderLifecycleStatus::Approved,
        OrderLifecycleStatus::Preparing,
        OrderLifecycleStatus::Ready,
        OrderLifecycleStatus::InTransit,
        OrderLifecycleStatus::Delivered,
        OrderLifecycleStatus::Rejected,
        OrderLifecycleStatus::Cancelled,
        OrderLifecycleStatus::Failed,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            OrderLifecycleStatus::Pending => "pending",
            OrderLifecycleStatus::Approved => "approved",
            OrderLifecycleStatus::Preparing => "preparing",
            OrderLifecycleStatus::Ready => "ready",
            OrderLifecycleStatus::InTransit => "in_transit",
            OrderLifecycleStatus::Delivered => "delivered",
            OrderLifecycleStatus::Rejected => "rejected",
            OrderLifecycleStatus::Cancelled => "cancelled",
            OrderLifecycleStatus::Failed => "failed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderLifecycleStatus::Delivered
                | OrderLifecycleStatus::Rejected
                | OrderLifecycleStatus::Cancelled
        )
    }
}

impl OrderLifecycleStatus {
    /// Statuses the given role may move an order to from `self`
    pub fn permitted_targets(self, role: ActorRole) -> &'static [OrderLifecycleStatus] {
        use ActorRole::*;
        use OrderLifecycleStatus::*;

        match (self, role) {
            (Pending, Vendor | Admin) => &[Approved, Rejected],
            (Pending, Customer) => &[Cancelled],
            (Approved, Vendor | Admin) => &[Preparing, Cancelled],
            (Approved, Customer) => &[Cancelled],
            (Preparing, Vendor | Admin) => &[Ready, Cancelled],
            (Ready, Vendor | Admin | Delivery) => &[InTransit],
            (InTransit, Delivery | Admin) => &[Delivered, Failed],
            // Retry after a failed delivery is an admin override
            (Failed, Admin) => &[InTransit],
            _ => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderLifecycleStatus, role: ActorRole) -> bool {
        self.permitted_targets(role).contains(&next)
    }
}

/// Purchase order approval status (`po_status`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderStatus {
    Draft,
    Approved,
    Cancelled,
    Completed,
}

impl StatusVocabulary for PurchaseOrderStatus {
    const KIND: DocumentKind = DocumentKind::PurchaseOrder;
    const ALL: &'static [Self] = &[
        PurchaseOrderStatus::Draft,
        PurchaseOrderStatus::Approved,
        PurchaseOrderStatus::Cancelled,
        PurchaseOrderStatus::Completed,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "Draft",
            PurchaseOrderStatus::Approved => "Approved",
            PurchaseOrderStatus::Cancelled => "Cancelled",
            PurchaseOrderStatus::Completed => "Completed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Completed)
    }
}

impl PurchaseOrderStatus {
    /// Only the idempotent write is accepted once a purchase order is completed
    pub fn can_transition_to(self, next: PurchaseOrderStatus) -> bool {
        !self.is_terminal() || next == self
    }
}

/// Purchase order delivery status (`status`), driven by GRN cascades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderDeliveryStatus {
    Created,
    Delivered,
}

impl PurchaseOrderDeliveryStatus {
    pub const ALL: [PurchaseOrderDeliveryStatus; 2] = [
        PurchaseOrderDeliveryStatus::Created,
        PurchaseOrderDeliveryStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderDeliveryStatus::Created => "Created",
            PurchaseOrderDeliveryStatus::Delivered => "Delivered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.as_str() == s)
    }
}

/// Goods receipt note status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrnStatus {
    Received,
    Rejected,
}

impl StatusVocabulary for GrnStatus {
    const KIND: DocumentKind = DocumentKind::Grn;
    const ALL: &'static [Self] = &[GrnStatus::Received, GrnStatus::Rejected];

    fn as_str(&self) -> &'static str {
        match self {
            GrnStatus::Received => "Received",
            GrnStatus::Rejected => "Rejected",
        }
    }
}

/// Return order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnOrderStatus {
    Received,
    Processed,
}

impl StatusVocabulary for ReturnOrderStatus {
    const KIND: DocumentKind = DocumentKind::ReturnOrder;
    const ALL: &'static [Self] = &[ReturnOrderStatus::Received, ReturnOrderStatus::Processed];

    fn as_str(&self) -> &'static str {
        match self {
            ReturnOrderStatus::Received => "Received",
            ReturnOrderStatus::Processed => "Processed",
        }
    }
}

const ORDER_STATUSES: &[&str] = &["Received", "Processed", "Dispatched", "Delivered"];
const ORDER_LIFECYCLE_STATUSES: &[&str] = &[
    "pending",
    "approved",
    "preparing",
    "ready",
    "in_transit",
    "delivered",
    "rejected",
    "cancelled",
    "failed",
];
const PURCHASE_ORDER_STATUSES: &[&str] = &["Draft", "Approved", "Cancelled", "Completed"];
const GRN_STATUSES: &[&str] = &["Received", "Rejected"];
const RETURN_ORDER_STATUSES: &[&str] = &["Received", "Processed"];

/// The fixed enumeration for a document kind, in declaration order
pub fn valid_statuses(kind: DocumentKind) -> &'static [&'static str] {
    match kind {
        DocumentKind::Order => ORDER_STATUSES,
        DocumentKind::OrderLifecycle => ORDER_LIFECYCLE_STATUSES,
        DocumentKind::PurchaseOrder => PURCHASE_ORDER_STATUSES,
        DocumentKind::Grn => GRN_STATUSES,
        DocumentKind::ReturnOrder => RETURN_ORDER_STATUSES,
    }
}

/// Canonical spelling of `raw` within the enumeration of `kind`
pub fn parse_status(kind: DocumentKind, raw: &str) -> Result<&'static str, StatusError> {
    valid_statuses(kind)
        .iter()
        .copied()
        .find(|status| *status == raw)
        .ok_or_else(|| StatusError::invalid(kind, raw))
}

// ============================================================================
// Transition decisions
// ============================================================================

struct Decision {
    allowed: bool,
    from: &'static str,
    to: &'static str,
    from_terminal: bool,
}

fn decide_typed<S: StatusVocabulary>(
    current: &str,
    requested: &str,
    allowed: impl FnOnce(S, S) -> bool,
) -> Result<Decision, StatusError> {
    // The requested value is validated first so callers always see the valid set
    let to = S::parse(requested)?;
    let from = S::parse(current)?;
    Ok(Decision {
        allowed: allowed(from, to),
        from: from.as_str(),
        to: to.as_str(),
        from_terminal: from.is_terminal(),
    })
}

fn decide(
    kind: DocumentKind,
    current: &str,
    requested: &str,
    role: ActorRole,
) -> Result<Decision, StatusError> {
    match kind {
        DocumentKind::Order => decide_typed::<OrderStatus>(current, requested, |_, _| true),
        DocumentKind::OrderLifecycle => {
            decide_typed::<OrderLifecycleStatus>(current, requested, |from, to| {
                from.can_transition_to(to, role)
            })
        }
        DocumentKind::PurchaseOrder => {
            decide_typed::<PurchaseOrderStatus>(current, requested, |from, to| {
                from.can_transition_to(to)
            })
        }
        DocumentKind::Grn => decide_typed::<GrnStatus>(current, requested, |_, _| true),
        DocumentKind::ReturnOrder => {
            decide_typed::<ReturnOrderStatus>(current, requested, |_, _| true)
        }
    }
}

/// Decide whether `role` may move a document of `kind` from `current` to
/// `requested`.
///
/// Returns `InvalidStatus` when either value is outside the kind's
/// enumeration, `Ok(false)` when the policy forbids the move.
pub fn can_transition(
    kind: DocumentKind,
    current: &str,
    requested: &str,
    role: ActorRole,
) -> Result<bool, StatusError> {
    decide(kind, current, requested, role).map(|d| d.allowed)
}

/// Like [`can_transition`], but a denial becomes a descriptive error
pub fn check_transition(
    kind: DocumentKind,
    current: &str,
    requested: &str,
    role: ActorRole,
) -> Result<(), StatusError> {
    let decision = decide(kind, current, requested, role)?;
    if decision.allowed {
        return Ok(());
    }
    if decision.from_terminal {
        return Err(StatusError::TerminalStateViolation {
            kind,
            status: decision.from,
        });
    }
    Err(StatusError::NotPermitted {
        kind,
        from: decision.from,
        to: decision.to,
        role,
    })
}

// ============================================================================
// GRN cascade
// ============================================================================

/// Outcome of a GRN status write, including the purchase order cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrnTransition {
    pub previous: Option<GrnStatus>,
    pub next: GrnStatus,
    /// Delivery status the parent purchase order must be moved to, if any
    pub cascade: Option<PurchaseOrderDeliveryStatus>,
}

/// Plan a GRN status write. `previous` is `None` when the GRN is being created.
pub fn plan_grn_status(
    previous: Option<GrnStatus>,
    requested: &str,
) -> Result<GrnTransition, StatusError> {
    let next = GrnStatus::parse(requested)?;
    let cascade = match next {
        GrnStatus::Received => Some(PurchaseOrderDeliveryStatus::Delivered),
        GrnStatus::Rejected if previous != Some(GrnStatus::Rejected) => {
            Some(PurchaseOrderDeliveryStatus::Created)
        }
        GrnStatus::Rejected => None,
    };

    Ok(GrnTransition {
        previous,
        next,
        cascade,
    })
}

// ============================================================================
// Purchase order updates
// ============================================================================

/// Validate an update against a purchase order in `current` status.
///
/// Returns the new `po_status` to write, or `None` when the status is left
/// untouched. A completed purchase order only accepts the idempotent no-op.
pub fn plan_purchase_order_update(
    current: PurchaseOrderStatus,
    requested: Option<&str>,
    has_other_changes: bool,
) -> Result<Option<PurchaseOrderStatus>, StatusError> {
    let requested = requested.map(PurchaseOrderStatus::parse).transpose()?;

    if current.is_terminal() {
        let idempotent = requested.map_or(true, |next| next == current);
        if idempotent && !has_other_changes {
            return Ok(None);
        }
        return Err(StatusError::TerminalStateViolation {
            kind: DocumentKind::PurchaseOrder,
            status: current.as_str(),
        });
    }

    Ok(requested.filter(|next| *next != current))
}
