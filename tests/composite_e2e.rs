//! End-to-end aggregate lifecycle: an invoice root with invoice-line children
//! persisted as one unit.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use diode::{
    BrokerError, CommandKind, CompositeBroker, CompositeCommandRequest, CompositeData,
    DiodeAction, DiodeCompositeFactory, DiodeEntity, DiodeError, EntityUid, ItemQueryRequest,
    MutationError, MutationRequest, Workspace,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct Invoice {
    uid: EntityUid,
    customer: String,
    total: i64,
}

impl DiodeEntity for Invoice {
    fn uid(&self) -> EntityUid {
        self.uid
    }
}

#[derive(Debug, Clone, PartialEq)]
struct InvoiceLine {
    uid: EntityUid,
    description: String,
    amount: i64,
}

impl DiodeEntity for InvoiceLine {
    fn uid(&self) -> EntityUid {
        self.uid
    }
}

fn line(description: &str, amount: i64) -> InvoiceLine {
    InvoiceLine {
        uid: EntityUid::new(),
        description: description.to_string(),
        amount,
    }
}

struct SetAmount(i64);

#[async_trait]
impl DiodeAction<InvoiceLine> for SetAmount {
    fn name(&self) -> &str {
        "set line amount"
    }

    async fn apply(
        &self,
        request: MutationRequest<'_, InvoiceLine>,
    ) -> Result<InvoiceLine, MutationError> {
        Ok(InvoiceLine {
            uid: request.item.uid,
            description: request.item.description.clone(),
            amount: self.0,
        })
    }
}

/// Records every aggregate command and serves one canned aggregate.
#[derive(Default)]
struct RecordingBroker {
    stored: Mutex<Option<CompositeData<Invoice, InvoiceLine>>>,
    commands: Mutex<Vec<CompositeCommandRequest<Invoice, InvoiceLine>>>,
}

impl RecordingBroker {
    fn with_aggregate(data: CompositeData<Invoice, InvoiceLine>) -> Self {
        Self {
            stored: Mutex::new(Some(data)),
            commands: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<CompositeCommandRequest<Invoice, InvoiceLine>> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompositeBroker<Invoice, InvoiceLine> for RecordingBroker {
    async fn execute_query(
        &self,
        request: ItemQueryRequest,
    ) -> Result<Option<CompositeData<Invoice, InvoiceLine>>, BrokerError> {
        let stored = self.stored.lock().unwrap();
        Ok(stored
            .as_ref()
            .filter(|data| data.root.uid == request.uid)
            .cloned())
    }

    async fn execute_command(
        &self,
        request: CompositeCommandRequest<Invoice, InvoiceLine>,
    ) -> Result<(), BrokerError> {
        self.commands.lock().unwrap().push(request);
        Ok(())
    }
}

struct Fixture {
    workspace: Arc<Workspace>,
    factory: DiodeCompositeFactory,
    broker: Arc<RecordingBroker>,
}

fn fixture(broker: RecordingBroker) -> Fixture {
    let workspace = Arc::new(Workspace::new());
    let broker = Arc::new(broker);
    workspace.register_composite::<Invoice, InvoiceLine>(broker.clone());
    let factory = DiodeCompositeFactory::new(workspace.clone());
    Fixture {
        workspace,
        factory,
        broker,
    }
}

fn invoice_aggregate(lines: Vec<InvoiceLine>) -> CompositeData<Invoice, InvoiceLine> {
    CompositeData {
        root: Invoice {
            uid: EntityUid::new(),
            customer: "ACME".to_string(),
            total: lines.iter().map(|l| l.amount).sum(),
        },
        items: lines,
    }
}

#[tokio::test]
async fn new_child_is_added_before_the_deleted_child_is_removed() {
    let existing = line("widgets", 100);
    let existing_uid = existing.uid;
    let data = invoice_aggregate(vec![existing]);
    let root_uid = data.root.uid;
    let fx = fixture(RecordingBroker::with_aggregate(data));

    let composite = fx
        .factory
        .load::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap();

    // Delete the existing line first, then add a new one, so insertion order
    // is the reverse of the required command order.
    composite.mark_item_for_deletion(existing_uid).await.unwrap();
    let added = composite.add_item(line("gadgets", 50)).unwrap();

    let kind = fx
        .factory
        .persist::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap();
    assert_eq!(kind, CommandKind::None);

    let commands = fx.broker.commands();
    assert_eq!(commands.len(), 1);
    let kinds: Vec<CommandKind> = commands[0].items.iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![CommandKind::Add, CommandKind::Delete]);
    assert_eq!(commands[0].items[0].uid, added.uid());
    assert_eq!(commands[0].items[1].uid, existing_uid);

    // Success clears the survivors and drops the deleted child.
    assert!(composite.items().get_context(existing_uid).is_none());
    let kept = composite.items().get_context(added.uid()).unwrap();
    assert_eq!(kept.command_kind().await, CommandKind::None);
}

#[tokio::test]
async fn loading_an_aggregate_tracks_root_and_children() {
    let data = invoice_aggregate(vec![line("widgets", 100), line("gadgets", 50)]);
    let root_uid = data.root.uid;
    let fx = fixture(RecordingBroker::with_aggregate(data.clone()));

    let composite = fx
        .factory
        .load::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap();

    assert_eq!(composite.uid().unwrap(), root_uid);
    assert_eq!(composite.root().unwrap().snapshot().await, data.root);
    assert_eq!(composite.items().len(), 2);

    // A second load of the same aggregate is rejected.
    let err = fx
        .factory
        .load::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap_err();
    assert!(matches!(err, DiodeError::AlreadyTracked { uid } if uid == root_uid));
}

#[tokio::test]
async fn child_edit_persists_as_an_update_inside_the_aggregate() {
    let item = line("widgets", 100);
    let item_uid = item.uid;
    let data = invoice_aggregate(vec![item]);
    let root_uid = data.root.uid;
    let fx = fixture(RecordingBroker::with_aggregate(data));

    let composite = fx
        .factory
        .load::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap();
    composite
        .items()
        .dispatch(item_uid, &SetAmount(175))
        .await
        .unwrap();

    fx.factory
        .persist::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap();

    let commands = fx.broker.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].items[0].kind, CommandKind::Update);
    assert_eq!(commands[0].items[0].item.amount, 175);
}

#[tokio::test]
async fn untouched_aggregate_persist_never_reaches_the_broker() {
    let data = invoice_aggregate(vec![line("widgets", 100)]);
    let root_uid = data.root.uid;
    let fx = fixture(RecordingBroker::with_aggregate(data));

    fx.factory
        .load::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap();
    let kind = fx
        .factory
        .persist::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap();

    assert_eq!(kind, CommandKind::None);
    assert!(fx.broker.commands().is_empty());
}

#[tokio::test]
async fn new_aggregate_persists_root_add_with_child_adds() {
    let fx = fixture(RecordingBroker::default());

    let composite = fx
        .factory
        .create_new::<Invoice, InvoiceLine>(Some(Invoice {
            uid: EntityUid::new(),
            customer: "ACME".to_string(),
            total: 0,
        }))
        .unwrap();
    let root_uid = composite.uid().unwrap();
    composite.add_item(line("widgets", 100)).unwrap();

    let kind = fx
        .factory
        .persist::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap();

    assert_eq!(kind, CommandKind::Add);
    let commands = fx.broker.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].root.kind, CommandKind::Add);
    assert_eq!(commands[0].items[0].kind, CommandKind::Add);

    // Everything is clean after a confirmed persist.
    assert_eq!(
        composite.root().unwrap().command_kind().await,
        CommandKind::None
    );
}

#[tokio::test]
async fn discarded_new_aggregate_is_dropped_without_store_interaction() {
    let fx = fixture(RecordingBroker::default());

    let composite = fx
        .factory
        .create_new::<Invoice, InvoiceLine>(None)
        .unwrap();
    let root_uid = composite.uid().unwrap();
    composite.root().unwrap().mark_for_deletion().await;

    let kind = fx
        .factory
        .persist::<Invoice, InvoiceLine>(root_uid)
        .await
        .unwrap();

    assert_eq!(kind, CommandKind::None);
    assert!(fx.broker.commands().is_empty());
    let registry = fx
        .workspace
        .composite_registry::<Invoice, InvoiceLine>()
        .unwrap();
    assert!(registry.get(root_uid).is_none());
}

#[tokio::test]
async fn unregistered_pairing_reports_no_registry() {
    let workspace = Arc::new(Workspace::new());
    let factory = DiodeCompositeFactory::new(workspace);

    let err = factory
        .load::<Invoice, InvoiceLine>(EntityUid::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DiodeError::NoRegistry { .. }));
}
