//! Two-way property links
//!
//! A [`PropertyLink`] keeps two endpoint attributes equal. On creation it
//! copies A into B, then listens on each endpoint's change channel and
//! mirrors every external change to the other side.
//!
//! ## Loop prevention
//! Writing B from a change on A makes B announce its own change, which would
//! push B back into A. Before each write the link records the value it is
//! about to store on that side. A notification from a side whose current
//! value still matches its record is the link's own echo and is consumed
//! without propagating. This holds for queued delivery too, where the echo
//! may arrive after unrelated changes to the other side. The `in_change` flag
//! is held across the whole read-coerce-compare-write step as well, so
//! nothing re-enters while a write is in flight.
//!
//! ## Failures
//! Propagation never fails loudly. A dead endpoint, a value that does not
//! convert to the destination type, or a rejected write simply drops that
//! one update; the link stays bound.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use uuid::Uuid;

use super::coerce::coerce;
use super::endpoint::Endpoint;
use super::error::LinkError;
use crate::object::{Subscription, Value};

pub type LinkId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Bound,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    AToB,
    BToA,
}

/// Holds the reentrancy flag for the duration of one propagation step.
struct ChangeGuard<'a>(&'a AtomicBool);

impl<'a> ChangeGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for ChangeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State shared between the link and its change callbacks.
struct LinkShared {
    a: Endpoint,
    b: Endpoint,
    in_change: AtomicBool,
    /// Value last written into A and B whose notification is still due.
    echo_a: Mutex<Option<Value>>,
    echo_b: Mutex<Option<Value>>,
}

impl LinkShared {
    fn new(a: Endpoint, b: Endpoint) -> Self {
        Self {
            a,
            b,
            in_change: AtomicBool::new(false),
            echo_a: Mutex::new(None),
            echo_b: Mutex::new(None),
        }
    }

    /// Consume the pending echo of `side` and report whether the side still
    /// holds the value the link wrote there.
    fn is_own_echo(echo: &Mutex<Option<Value>>, side: &Endpoint) -> bool {
        let Some(expected) = echo.lock().take() else {
            return false;
        };
        side.read().is_some_and(|current| current.same_as(&expected))
    }

    /// Copy one side into the other. Returns whether the destination was
    /// written.
    fn propagate(&self, direction: Direction) -> bool {
        let (source, dest, source_echo, dest_echo) = match direction {
            Direction::AToB => (&self.a, &self.b, &self.echo_a, &self.echo_b),
            Direction::BToA => (&self.b, &self.a, &self.echo_b, &self.echo_a),
        };

        if Self::is_own_echo(source_echo, source) {
            log::trace!("{} -> {} suppressed: own echo", source.pretty(), dest.pretty());
            return false;
        }
        let Some(_guard) = ChangeGuard::acquire(&self.in_change) else {
            log::trace!("{} -> {} suppressed: already propagating", source.pretty(), dest.pretty());
            return false;
        };
        if !source.is_valid() || !dest.is_valid() {
            log::trace!("Link endpoint expired; dropping {:?} update", direction);
            return false;
        }

        let Some(value) = source.read() else {
            return false;
        };
        let value = match coerce(value, dest.attribute().value_type) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("{} -> {}: {}", source.pretty(), dest.pretty(), e);
                return false;
            }
        };
        if dest.read().is_some_and(|current| current.same_as(&value)) {
            return false;
        }

        *dest_echo.lock() = Some(value.clone());
        match dest.write(value) {
            Ok(true) => true,
            Ok(false) => {
                dest_echo.lock().take();
                false
            }
            Err(e) => {
                dest_echo.lock().take();
                log::debug!("{} -> {}: write rejected: {}", source.pretty(), dest.pretty(), e);
                false
            }
        }
    }
}

/// A live two-way binding between two endpoint attributes.
///
/// Dropping the link disposes it.
pub struct PropertyLink {
    id: LinkId,
    shared: Arc<LinkShared>,
    subscriptions: Vec<Subscription>,
    state: LinkState,
    description: String,
}

impl PropertyLink {
    /// Bind `a` and `b`: copy A into B, then follow both change channels.
    pub fn create(a: Endpoint, b: Endpoint) -> Result<Self, LinkError> {
        if !a.is_valid() || !b.is_valid() {
            return Err(LinkError::InvalidObject);
        }

        let shared = Arc::new(LinkShared::new(a, b));
        shared.propagate(Direction::AToB);

        let mut subscriptions = Vec::with_capacity(2);
        for (endpoint, direction) in [(&shared.a, Direction::AToB), (&shared.b, Direction::BToA)] {
            let weak = Arc::downgrade(&shared);
            let subscription = endpoint.subscribe(move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.propagate(direction);
                }
            });
            subscriptions.extend(subscription);
        }

        let description = format!("Linked {}  <=>  {}", shared.a.pretty(), shared.b.pretty());
        log::info!("{}", description);

        Ok(Self {
            id: Uuid::new_v4(),
            shared,
            subscriptions,
            state: LinkState::Bound,
            description,
        })
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn a(&self) -> &Endpoint {
        &self.shared.a
    }

    pub fn b(&self) -> &Endpoint {
        &self.shared.b
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// The "linked" notice produced at creation.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// True when changes on both sides are observed.
    pub fn is_bidirectional(&self) -> bool {
        self.shared.a.channel().is_some() && self.shared.b.channel().is_some()
    }

    /// Stop following both endpoints. Safe to call repeatedly and after the
    /// objects are gone.
    pub fn dispose(&mut self) {
        if self.state == LinkState::Disposed {
            return;
        }
        for subscription in &mut self.subscriptions {
            subscription.cancel();
        }
        self.subscriptions.clear();
        self.state = LinkState::Disposed;
        log::debug!("Disposed link {}", self.id);
    }
}

impl Drop for PropertyLink {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for PropertyLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyLink")
            .field("id", &self.id)
            .field("a", &self.shared.a.pretty())
            .field("b", &self.shared.b.pretty())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Resolver;
    use crate::object::{ChannelId, Delivery, ObjectHandle, ObjectTree, Value, ValueType};
    use crate::widgets;
    use std::sync::atomic::AtomicUsize;

    struct Fixture {
        tree: Arc<ObjectTree>,
        root: ObjectHandle,
        resolver: Resolver,
    }

    impl Fixture {
        fn new(delivery: Delivery) -> Self {
            let tree = ObjectTree::with_delivery(delivery);
            let root = tree.insert_root("Form", widgets::create("QWidget").unwrap());
            for (class, name) in [
                ("QLineEdit", "lineEdit"),
                ("QLineEdit", "lineEdit2"),
                ("QLabel", "label"),
                ("QSlider", "slider"),
                ("QDoubleSpinBox", "dspin"),
                ("QDoubleSpinBox", "dspin2"),
                ("QSpinBox", "spin"),
            ] {
                tree.insert_child(root, name, widgets::create(class).unwrap());
            }
            Self {
                tree,
                root,
                resolver: Resolver::default(),
            }
        }

        fn handle(&self, name: &str) -> ObjectHandle {
            self.tree.find_by_name(self.root, name).unwrap()
        }

        fn link(&self, left: (&str, &str), right: (&str, &str)) -> PropertyLink {
            let a = self
                .resolver
                .resolve_endpoint(&self.tree, self.root, left.0, left.1)
                .unwrap();
            let b = self
                .resolver
                .resolve_endpoint(&self.tree, self.root, right.0, right.1)
                .unwrap();
            PropertyLink::create(a, b).unwrap()
        }

        fn set(&self, name: &str, attr: &str, value: Value) {
            self.tree.set_attribute(self.handle(name), attr, value).unwrap();
        }

        fn get(&self, name: &str, attr: &str) -> Value {
            self.tree.get_attribute(self.handle(name), attr).unwrap()
        }

        /// Count emissions of `channel` on `name`.
        fn counter(&self, name: &str, channel: ChannelId) -> (Arc<AtomicUsize>, Subscription) {
            let hits = Arc::new(AtomicUsize::new(0));
            let seen = hits.clone();
            let sub = self
                .tree
                .subscribe(self.handle(name), channel, move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            (hits, sub)
        }
    }

    fn text_changed() -> ChannelId {
        ChannelId::new("textChanged", Some(ValueType::String))
    }

    #[test]
    fn test_initial_sync_a_to_b() {
        let fx = Fixture::new(Delivery::Immediate);
        fx.set("lineEdit", "text", "hello".into());
        fx.set("lineEdit2", "text", "other".into());
        let link = fx.link(("lineEdit", "text"), ("lineEdit2", "text"));

        assert_eq!(fx.get("lineEdit2", "text"), Value::from("hello"));
        assert_eq!(fx.get("lineEdit", "text"), Value::from("hello"));
        assert_eq!(link.state(), LinkState::Bound);
        assert_eq!(link.description(), "Linked lineEdit.text  <=>  lineEdit2.text");
        assert!(link.is_bidirectional());
    }

    #[test]
    fn test_both_directions() {
        let fx = Fixture::new(Delivery::Immediate);
        let _link = fx.link(("lineEdit", "text"), ("lineEdit2", "text"));

        fx.set("lineEdit", "text", "from a".into());
        assert_eq!(fx.get("lineEdit2", "text"), Value::from("from a"));

        fx.set("lineEdit2", "text", "from b".into());
        assert_eq!(fx.get("lineEdit", "text"), Value::from("from b"));
    }

    #[test]
    fn test_single_write_per_external_change() {
        let fx = Fixture::new(Delivery::Immediate);
        let _link = fx.link(("lineEdit", "text"), ("lineEdit2", "text"));
        let (a_hits, _a) = fx.counter("lineEdit", text_changed());
        let (b_hits, _b) = fx.counter("lineEdit2", text_changed());

        fx.set("lineEdit", "text", "x".into());
        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_equal_value_is_not_rewritten() {
        let fx = Fixture::new(Delivery::Immediate);
        let link = fx.link(("lineEdit", "text"), ("lineEdit2", "text"));
        let (b_hits, _b) = fx.counter("lineEdit2", text_changed());

        // Both sides already equal: forcing a propagation writes nothing.
        assert!(!link.shared.propagate(Direction::AToB));
        assert!(!link.shared.propagate(Direction::BToA));
        assert_eq!(b_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_queued_echo_is_noop() {
        let fx = Fixture::new(Delivery::Queued);
        let _link = fx.link(("lineEdit", "text"), ("lineEdit2", "text"));
        let (a_hits, _a) = fx.counter("lineEdit", text_changed());
        let (b_hits, _b) = fx.counter("lineEdit2", text_changed());

        fx.set("lineEdit", "text", "queued".into());
        assert_eq!(fx.get("lineEdit2", "text"), Value::from(""));

        // A's change reaches the link, which writes B and queues B's echo.
        assert_eq!(fx.tree.dispatch_pending(), 1);
        assert_eq!(fx.get("lineEdit2", "text"), Value::from("queued"));
        // B's echo is recognised as the link's own write.
        assert_eq!(fx.tree.dispatch_pending(), 1);
        assert_eq!(fx.tree.pending_count(), 0);

        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_initial_echo_keeps_later_write() {
        let fx = Fixture::new(Delivery::Queued);
        let _link = fx.link(("slider", "value"), ("lineEdit", "text"));
        // Initial sync wrote B and queued its echo.
        assert_eq!(fx.get("lineEdit", "text"), Value::from("0"));
        assert_eq!(fx.tree.pending_count(), 1);

        fx.set("slider", "value", Value::Int(12));
        while fx.tree.dispatch_pending() > 0 {}

        assert_eq!(fx.get("slider", "value"), Value::Int(12));
        assert_eq!(fx.get("lineEdit", "text"), Value::from("12"));
    }

    #[test]
    fn test_queued_nan_settles() {
        let fx = Fixture::new(Delivery::Queued);
        let _link = fx.link(("dspin", "value"), ("dspin2", "value"));
        fx.set("dspin", "value", Value::Double(f64::NAN));

        let mut rounds = 0;
        while fx.tree.dispatch_pending() > 0 {
            rounds += 1;
            assert!(rounds < 10, "queue did not drain");
        }
        assert!(matches!(fx.get("dspin2", "value"), Value::Double(d) if d.is_nan()));
    }

    #[test]
    fn test_immediate_nan_rewrite_is_unchanged() {
        let fx = Fixture::new(Delivery::Immediate);
        let _link = fx.link(("dspin", "value"), ("dspin2", "value"));
        let (b_hits, _b) = fx.counter(
            "dspin2",
            ChannelId::new("valueChanged", Some(ValueType::Double)),
        );

        let dspin = fx.handle("dspin");
        assert_eq!(fx.tree.set_attribute(dspin, "value", Value::Double(f64::NAN)), Ok(true));
        assert_eq!(fx.tree.set_attribute(dspin, "value", Value::Double(f64::NAN)), Ok(false));
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);
        assert!(matches!(fx.get("dspin2", "value"), Value::Double(d) if d.is_nan()));
    }

    #[test]
    fn test_one_way_when_dest_has_no_channel() {
        let fx = Fixture::new(Delivery::Immediate);
        fx.set("lineEdit", "text", "start".into());
        let link = fx.link(("lineEdit", "text"), ("label", "text"));
        assert!(!link.is_bidirectional());
        assert_eq!(fx.get("label", "text"), Value::from("start"));

        fx.set("lineEdit", "text", "next".into());
        assert_eq!(fx.get("label", "text"), Value::from("next"));

        // Label changes are not observed.
        fx.set("label", "text", "manual".into());
        assert_eq!(fx.get("lineEdit", "text"), Value::from("next"));
    }

    #[test]
    fn test_numeric_coercion() {
        let fx = Fixture::new(Delivery::Immediate);
        fx.set("slider", "value", Value::Int(42));
        let _link = fx.link(("slider", "value"), ("dspin", "value"));
        assert_eq!(fx.get("dspin", "value"), Value::Double(42.0));

        fx.set("dspin", "value", Value::Double(7.6));
        assert_eq!(fx.get("slider", "value"), Value::Int(8));
    }

    #[test]
    fn test_coercion_failure_is_dropped() {
        let fx = Fixture::new(Delivery::Immediate);
        fx.set("spin", "value", Value::Int(5));
        let link = fx.link(("lineEdit", "text"), ("spin", "value"));
        // "" is not a number, so the initial sync leaves the spin box alone.
        assert_eq!(fx.get("spin", "value"), Value::Int(5));

        fx.set("lineEdit", "text", "12".into());
        assert_eq!(fx.get("spin", "value"), Value::Int(12));

        fx.set("lineEdit", "text", "twelve".into());
        assert_eq!(fx.get("spin", "value"), Value::Int(12));
        assert_eq!(link.state(), LinkState::Bound);

        // The link still works after a dropped update.
        fx.set("spin", "value", Value::Int(3));
        assert_eq!(fx.get("lineEdit", "text"), Value::from("3"));
    }

    #[test]
    fn test_destroyed_endpoint_is_safe() {
        let fx = Fixture::new(Delivery::Immediate);
        let link = fx.link(("lineEdit", "text"), ("lineEdit2", "text"));
        fx.tree.destroy(fx.handle("lineEdit2"));

        assert!(!link.b().is_valid());
        assert_eq!(link.b().pretty(), "<null>.<null>");
        fx.set("lineEdit", "text", "still fine".into());
        assert!(!link.shared.propagate(Direction::AToB));
        assert!(!link.shared.propagate(Direction::BToA));
    }

    #[test]
    fn test_create_rejects_stale_endpoint() {
        let fx = Fixture::new(Delivery::Immediate);
        let a = fx
            .resolver
            .resolve_endpoint(&fx.tree, fx.root, "lineEdit", "text")
            .unwrap();
        let b = fx
            .resolver
            .resolve_endpoint(&fx.tree, fx.root, "label", "text")
            .unwrap();
        fx.tree.destroy(b.object());
        let before = fx.tree.subscriber_count();
        assert_eq!(
            PropertyLink::create(a, b).unwrap_err(),
            LinkError::InvalidObject
        );
        assert_eq!(fx.tree.subscriber_count(), before);
    }

    #[test]
    fn test_dispose() {
        let fx = Fixture::new(Delivery::Immediate);
        let mut link = fx.link(("lineEdit", "text"), ("lineEdit2", "text"));
        assert_eq!(fx.tree.subscriber_count(), 2);

        link.dispose();
        link.dispose();
        assert_eq!(link.state(), LinkState::Disposed);
        assert_eq!(fx.tree.subscriber_count(), 0);

        fx.set("lineEdit", "text", "unlinked".into());
        assert_eq!(fx.get("lineEdit2", "text"), Value::from(""));
    }

    #[test]
    fn test_dispose_after_tree_dropped() {
        let fx = Fixture::new(Delivery::Immediate);
        let mut link = fx.link(("lineEdit", "text"), ("lineEdit2", "text"));
        drop(fx);
        assert!(!link.a().is_valid());
        link.dispose();
        assert_eq!(link.state(), LinkState::Disposed);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let fx = Fixture::new(Delivery::Immediate);
        {
            let _link = fx.link(("slider", "value"), ("spin", "value"));
            assert_eq!(fx.tree.subscriber_count(), 2);
        }
        assert_eq!(fx.tree.subscriber_count(), 0);
    }
}
