use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Mutex;

use tourdesk::catalog::{Faq, faq_view};
use tourdesk::source::{DynamicRecord, Field, unwrap_envelope};
use tourdesk::table::{ColumnDescriptor, TabularView};
use tourdesk::upload::{
    AssetValue, DirectUploadClient, GrantAuthority, LocalFile, ObjectStore, UploadError,
    UploadGrant, UploadMode, UploadTarget, UploadedAsset,
};

#[derive(Default)]
struct ScriptedAuthority {
    requests: Mutex<Vec<UploadTarget>>,
}

impl ScriptedAuthority {
    fn requests(&self) -> Vec<UploadTarget> {
        self.requests.lock().unwrap().clone()
    }
}

impl GrantAuthority for ScriptedAuthority {
    fn request_grant(&self, target: &UploadTarget) -> Result<UploadGrant, UploadError> {
        self.requests.lock().unwrap().push(target.clone());
        if target.file_name == "leopard.jpg" {
            return Ok(UploadGrant {
                upload_url: "https://store/x".to_string(),
                key: "k1".to_string(),
                public_url: "https://cdn/k1".to_string(),
            });
        }
        Ok(UploadGrant {
            upload_url: format!("https://store/{}", target.file_name),
            key: format!("key-{}", target.file_name),
            public_url: format!("https://cdn/{}", target.file_name),
        })
    }
}

/// Refuses every write whose url mentions "broken".
#[derive(Default)]
struct ScriptedStore {
    puts: Mutex<Vec<(String, String)>>,
}

impl ObjectStore for ScriptedStore {
    fn put(&self, url: &str, content_type: &str, _bytes: &[u8]) -> Result<(), UploadError> {
        self.puts
            .lock()
            .unwrap()
            .push((url.to_string(), content_type.to_string()));
        if url.contains("broken") {
            return Err(UploadError::UploadFailed {
                status: Some(403),
                reason: "Forbidden".to_string(),
            });
        }
        Ok(())
    }
}

fn image(name: &str) -> LocalFile {
    LocalFile::new(name, Some("image/jpeg"), vec![0xFF, 0xD8, 0xFF])
}

fn asset(name: &str) -> UploadedAsset {
    UploadedAsset {
        url: format!("https://cdn/{name}"),
        key: format!("key-{name}"),
    }
}

#[test]
fn faq_table_sorts_by_order_and_searches_questions() {
    let records = vec![
        DynamicRecord::new("1")
            .with_field("order", Field::Number(3.0))
            .with_field("question", Field::Text("Z".to_string())),
        DynamicRecord::new("2")
            .with_field("order", Field::Number(1.0))
            .with_field("question", Field::Text("A".to_string())),
    ];
    let columns = vec![
        ColumnDescriptor::new("order", "order").sortable(true),
        ColumnDescriptor::new("question", "question").sortable(true),
    ];
    let mut view = TabularView::new(records, columns).with_search_keys(["question"]);

    view.set_sort_key("order");
    assert_eq!(view.visible_ids(), vec!["2", "1"]);
    view.set_sort_key("order");
    assert_eq!(view.visible_ids(), vec!["1", "2"]);

    view.set_sort_key("order");
    view.set_search_term("z");
    assert_eq!(view.visible_ids(), vec!["1"]);
}

#[test]
fn typed_faq_records_behave_the_same() {
    let body = serde_json::json!({"faqs": [
        {"_id": "1", "order": 3, "question": "Z"},
        {"_id": "2", "order": 1, "question": "A"}
    ]});
    let faqs: Vec<Faq> = unwrap_envelope(body, "faqs")
        .unwrap()
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap())
        .collect();
    let mut view = faq_view(faqs);
    view.set_sort_key("order");
    assert_eq!(view.visible_ids(), vec!["2", "1"]);
    view.set_sort_key("order");
    assert_eq!(view.visible_ids(), vec!["1", "2"]);
}

#[test]
fn single_image_drop_yields_the_public_reference() {
    let authority = ScriptedAuthority::default();
    let store = ScriptedStore::default();
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    let mut client =
        DirectUploadClient::new(UploadMode::Single).on_change(move |v| sink.borrow_mut().push(v.clone()));

    client.drag_enter();
    let batch = client.drop_files(vec![image("leopard.jpg")]).unwrap();
    let outcome = batch.run(&authority, &store);
    client.complete(&outcome);

    let expected = UploadedAsset {
        url: "https://cdn/k1".to_string(),
        key: "k1".to_string(),
    };
    assert_eq!(client.value(), AssetValue::Single(Some(expected.clone())));
    assert_eq!(*changes.borrow(), vec![AssetValue::Single(Some(expected))]);
    assert_eq!(
        store.puts.lock().unwrap().clone(),
        vec![("https://store/x".to_string(), "image/jpeg".to_string())]
    );
    assert_eq!(
        serde_json::to_value(client.value()).unwrap(),
        serde_json::json!({"url": "https://cdn/k1", "key": "k1"})
    );
}

#[test]
fn dropping_text_makes_no_grant_request() {
    let authority = ScriptedAuthority::default();
    let store = ScriptedStore::default();
    let before = asset("old.jpg");
    let mut client =
        DirectUploadClient::new(UploadMode::Single).with_value(AssetValue::Single(Some(before.clone())));

    let text = LocalFile::new("notes.txt", Some("text/plain"), b"hello".to_vec());
    assert!(client.upload(vec![text], &authority, &store).is_none());
    assert!(authority.requests().is_empty());
    assert_eq!(client.value(), AssetValue::Single(Some(before)));
}

#[test]
fn single_mode_replaces_the_previous_asset() {
    let mut client =
        DirectUploadClient::new(UploadMode::Single).with_value(AssetValue::Single(Some(asset("a.jpg"))));
    client.upload(vec![image("b.jpg")], &ScriptedAuthority::default(), &ScriptedStore::default());
    assert_eq!(client.value(), AssetValue::Single(Some(asset("b.jpg"))));
}

#[test]
fn multi_mode_appends_in_order() {
    let mut client = DirectUploadClient::new(UploadMode::Multiple)
        .with_value(AssetValue::Multiple(vec![asset("a.jpg"), asset("b.jpg")]));
    client.upload(
        vec![image("c.jpg"), image("d.jpg")],
        &ScriptedAuthority::default(),
        &ScriptedStore::default(),
    );
    assert_eq!(
        client.value(),
        AssetValue::Multiple(vec![asset("a.jpg"), asset("b.jpg"), asset("c.jpg"), asset("d.jpg")])
    );
}

#[test]
fn one_failed_transfer_keeps_the_others() {
    let failures = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&failures);
    let mut client = DirectUploadClient::new(UploadMode::Multiple)
        .on_failure(move |f| sink.borrow_mut().push((f.file_name.clone(), f.error.clone())));

    let authority = ScriptedAuthority::default();
    let outcome = client
        .upload(
            vec![image("one.jpg"), image("broken.jpg"), image("three.jpg")],
            &authority,
            &ScriptedStore::default(),
        )
        .unwrap();

    assert_eq!(client.assets(), &[asset("one.jpg"), asset("three.jpg")]);
    assert_eq!(outcome.failures().count(), 1);
    assert_eq!(
        *failures.borrow(),
        vec![(
            "broken.jpg".to_string(),
            UploadError::UploadFailed {
                status: Some(403),
                reason: "Forbidden".to_string()
            }
        )]
    );
    assert_eq!(authority.requests().len(), 3);
    assert!(client.is_accepting_input());
}

#[test]
fn retrying_asks_for_a_fresh_grant() {
    let authority = ScriptedAuthority::default();
    let store = ScriptedStore::default();
    let mut client = DirectUploadClient::new(UploadMode::Multiple);

    client.upload(vec![image("broken.jpg")], &authority, &store);
    assert!(client.assets().is_empty());
    client.upload(vec![image("broken.jpg")], &authority, &store);
    assert_eq!(authority.requests().len(), 2);
}

#[test]
fn single_mode_keeps_the_first_image_that_made_it() {
    let authority = ScriptedAuthority::default();
    let mut client = DirectUploadClient::new(UploadMode::Single);

    let outcome = client
        .upload(
            vec![image("broken.jpg"), image("good.jpg")],
            &authority,
            &ScriptedStore::default(),
        )
        .unwrap();

    assert_eq!(authority.requests().len(), 2);
    assert_eq!(outcome.failures().count(), 1);
    assert_eq!(client.value(), AssetValue::Single(Some(asset("good.jpg"))));
}
