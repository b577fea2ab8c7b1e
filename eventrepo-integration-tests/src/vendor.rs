//! A vendor catalogue: the aggregate used throughout the integration tests.
//!
//! A vendor registers under a name, may be renamed, stocks items by SKU and
//! keeps a list of contacts. Contacts are entities of the vendor and point
//! back at it through a [`RootRef`].

use eventrepo::{
    Aggregate, AggregateId, AggregateRoot, AggregateType, DomainEvent, Entity, EventHandlers,
    RepositoryResult, RootRef,
};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use uuid::Uuid;

/// Identifier of a vendor.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRef,
    Serialize,
    Deserialize
))]
pub struct VendorId(Uuid);

impl VendorId {
    /// A fresh, time-ordered vendor id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

impl AggregateId for VendorId {
    fn id_param_name() -> &'static str {
        "vendorId"
    }

    fn as_string(&self) -> String {
        self.to_string()
    }
}

/// Everything that can happen to a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorEvent {
    /// The vendor was registered.
    Registered {
        /// Trading name
        name: String,
    },
    /// The vendor changed its trading name.
    Renamed {
        /// New trading name
        name: String,
    },
    /// Stock was added for an item.
    ItemAdded {
        /// Item code
        sku: String,
        /// Units added
        quantity: u32,
    },
    /// A contact person was added.
    ContactAdded {
        /// Contact number within the vendor
        contact_id: u32,
        /// Contact name
        name: String,
    },
    /// A note that no vendor handler understands.
    Annotated {
        /// Free text
        note: String,
    },
}

impl DomainEvent for VendorEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "VendorRegistered",
            Self::Renamed { .. } => "VendorRenamed",
            Self::ItemAdded { .. } => "ItemAdded",
            Self::ContactAdded { .. } => "ContactAdded",
            Self::Annotated { .. } => "VendorAnnotated",
        }
    }
}

/// A contact person, an entity inside a vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    root: RootRef<Vendor>,
    contact_id: u32,
    name: String,
}

impl Contact {
    /// Creates a contact belonging to `root`.
    pub const fn new(root: RootRef<Vendor>, contact_id: u32, name: String) -> Self {
        Self {
            root,
            contact_id,
            name,
        }
    }

    /// The contact's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Contact {
    type Root = Vendor;
    type Id = u32;

    fn root(&self) -> &RootRef<Vendor> {
        &self.root
    }

    fn entity_id(&self) -> &u32 {
        &self.contact_id
    }
}

/// State of one vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vendor {
    id: VendorId,
    name: Option<String>,
    stock: BTreeMap<String, u32>,
    contacts: Vec<Contact>,
}

impl Vendor {
    /// The vendor's id.
    pub const fn id(&self) -> VendorId {
        self.id
    }

    /// Current trading name, `None` before registration.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Units in stock for `sku`.
    pub fn stock_of(&self, sku: &str) -> u32 {
        self.stock.get(sku).copied().unwrap_or_default()
    }

    /// Contacts in the order they were added.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    fn registered(&mut self, event: &VendorEvent) {
        if let VendorEvent::Registered { name } = event {
            self.name = Some(name.clone());
        }
    }

    fn renamed(&mut self, event: &VendorEvent) {
        if let VendorEvent::Renamed { name } = event {
            self.name = Some(name.clone());
        }
    }

    fn item_added(&mut self, event: &VendorEvent) {
        if let VendorEvent::ItemAdded { sku, quantity } = event {
            *self.stock.entry(sku.clone()).or_default() += quantity;
        }
    }

    fn contact_added(&mut self, event: &VendorEvent) {
        if let VendorEvent::ContactAdded { contact_id, name } = event {
            let root = RootRef::new(self.id);
            self.contacts
                .push(Contact::new(root, *contact_id, name.clone()));
        }
    }
}

static VENDOR_TYPE: LazyLock<AggregateType> =
    LazyLock::new(|| AggregateType::try_new("Vendor").expect("valid aggregate type"));

static VENDOR_HANDLERS: LazyLock<EventHandlers<Vendor>> = LazyLock::new(|| {
    EventHandlers::<Vendor>::new()
        .on("VendorRegistered", Vendor::registered)
        .and_then(|h| h.on("VendorRenamed", Vendor::renamed))
        .and_then(|h| h.on("ItemAdded", Vendor::item_added))
        .and_then(|h| h.on("ContactAdded", Vendor::contact_added))
        .expect("vendor handlers are registered once")
});

impl Aggregate for Vendor {
    type Id = VendorId;
    type Event = VendorEvent;

    fn aggregate_type() -> &'static AggregateType {
        &VENDOR_TYPE
    }

    fn empty(id: &VendorId) -> Self {
        Self {
            id: *id,
            name: None,
            stock: BTreeMap::new(),
            contacts: Vec::new(),
        }
    }

    fn handlers() -> &'static EventHandlers<Self> {
        &VENDOR_HANDLERS
    }
}

/// Records a registration on a fresh vendor.
pub fn register(id: VendorId, name: &str) -> RepositoryResult<AggregateRoot<Vendor>> {
    let mut vendor = AggregateRoot::new(id);
    vendor.record(VendorEvent::Registered { name: name.into() })?;
    Ok(vendor)
}

/// A rename event.
pub fn renamed(name: &str) -> VendorEvent {
    VendorEvent::Renamed { name: name.into() }
}

/// An item-added event.
pub fn item_added(sku: &str, quantity: u32) -> VendorEvent {
    VendorEvent::ItemAdded {
        sku: sku.into(),
        quantity,
    }
}
