use bson::oid::ObjectId;
use mongorm_core::{ChangeNotifier, Document, DocumentFields, NavigationMap};
use mongorm_macros::Document;
use parking_lot::RwLock;

#[derive(Document)]
#[mongorm(collection = "accounts", single_reference = "owner", collection_reference = "tags")]
struct Account {
    #[mongorm(id)]
    id: RwLock<ObjectId>,
    #[mongorm(nav)]
    nav: RwLock<NavigationMap>,
    #[mongorm(notifier)]
    notifier: ChangeNotifier,
    #[mongorm(tracked)]
    name: RwLock<String>,
    #[mongorm(tracked)]
    balance: RwLock<i64>,
}

fn account() -> Account {
    Account {
        id: RwLock::new(ObjectId::new()),
        nav: RwLock::new(NavigationMap::new()),
        notifier: ChangeNotifier::new(),
        name: RwLock::new("initial".to_string()),
        balance: RwLock::new(0),
    }
}

#[test]
fn collection_name_comes_from_the_container_attribute() {
    assert_eq!(Account::collection_name(), "accounts");
}

#[test]
fn id_round_trips() {
    let acc = account();
    let fresh = ObjectId::new();
    acc.set_id(fresh);
    assert_eq!(acc.id(), fresh);
}

#[test]
fn tracked_field_setter_writes_through_and_notifies() {
    let acc = account();
    let notified = std::sync::Arc::new(std::sync::Mutex::new(None));
    let notified2 = notified.clone();
    acc.change_notifier().subscribe(move |field| {
        *notified2.lock().unwrap() = Some(field);
    });

    acc.set_field_bson("balance", bson::to_bson(&42i64).unwrap()).unwrap();
    assert_eq!(*acc.balance.read(), 42);
    assert_eq!(*notified.lock().unwrap(), Some("balance"));
}

#[test]
fn get_field_bson_round_trips_a_tracked_field() {
    let acc = account();
    acc.set_field_bson("name", bson::to_bson(&"widget".to_string()).unwrap()).unwrap();
    let value = acc.get_field_bson("name").unwrap();
    assert_eq!(value.as_str(), Some("widget"));
}

#[test]
fn unknown_field_is_rejected() {
    let acc = account();
    assert!(acc.set_field_bson("nonexistent", bson::Bson::Null).is_err());
    assert!(acc.get_field_bson("nonexistent").is_none());
}

#[test]
fn field_name_lists_match_the_declared_attributes() {
    assert_eq!(Account::field_names(), &["name", "balance"]);
    assert_eq!(Account::single_reference_names(), &["owner"]);
    assert_eq!(Account::collection_reference_names(), &["tags"]);
}

#[test]
fn single_reference_round_trips_through_the_navigation_map() {
    let acc = account();
    let owner = ObjectId::new();
    acc.set_single_reference("owner", owner);
    assert_eq!(acc.navigation().single("owner"), Some(owner));
}
