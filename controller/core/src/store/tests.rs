use super::*;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IntentKey<'a> {
    intent: &'a str,
    project: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChildKey<'a> {
    child: &'a str,
    intent: &'a str,
    project: &'a str,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
struct Doc {
    name: String,
}

fn doc(name: &str) -> Doc {
    Doc {
        name: name.to_string(),
    }
}

#[tokio::test]
async fn wildcard_matches_same_shape_only() {
    let store = MemStore::new();
    for (intent, project) in [("a", "p1"), ("b", "p1"), ("c", "p2")] {
        store
            .insert_typed("resources", &IntentKey { intent, project }, "data", &doc(intent))
            .await
            .unwrap();
    }
    store
        .insert_typed(
            "resources",
            &ChildKey {
                child: "x",
                intent: "a",
                project: "p1",
            },
            "data",
            &doc("x"),
        )
        .await
        .unwrap();

    let found: Vec<Doc> = store
        .find_typed(
            "resources",
            &IntentKey {
                intent: "",
                project: "p1",
            },
            "data",
        )
        .await
        .unwrap();
    assert_eq!(found, vec![doc("a"), doc("b")]);
}

#[tokio::test]
async fn exists_query_matches_any_shape() {
    let store = MemStore::new();
    store
        .insert(
            "resources",
            &json!({"policyIntent": "i1", "project": "p"}),
            None,
            "data",
            &json!({"name": "i1"}),
        )
        .await
        .unwrap();
    store
        .insert(
            "resources",
            &json!({"project": "p", "compositeApp": "ca"}),
            None,
            "data",
            &json!({"name": "other"}),
        )
        .await
        .unwrap();

    let found = store
        .find("resources", &json!({"policyIntent": {"$exists": true}}), "data")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let found: Doc = unmarshal(&found[0]).unwrap();
    assert_eq!(found, doc("i1"));
}

#[tokio::test]
async fn insert_is_an_upsert_per_tag() {
    let store = MemStore::new();
    let key = IntentKey {
        intent: "a",
        project: "p",
    };
    store
        .insert_typed("resources", &key, "data", &doc("one"))
        .await
        .unwrap();
    store
        .insert_typed("resources", &key, "data", &doc("two"))
        .await
        .unwrap();
    store
        .insert_typed("resources", &key, "content", &json!({"content": "Zm9v"}))
        .await
        .unwrap();

    assert_eq!(store.len("resources"), 1);
    let found: Vec<Doc> = store.find_typed("resources", &key, "data").await.unwrap();
    assert_eq!(found, vec![doc("two")]);
    let content: Vec<serde_json::Value> =
        store.find_typed("resources", &key, "content").await.unwrap();
    assert_eq!(content, vec![json!({"content": "Zm9v"})]);
}

#[tokio::test]
async fn remove_missing_is_not_found() {
    let store = MemStore::new();
    let err = store
        .remove_typed(
            "resources",
            &IntentKey {
                intent: "a",
                project: "p",
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "db Remove resource not found");
}

#[tokio::test]
async fn remove_parent_with_children_conflicts() {
    let store = MemStore::new();
    let parent = IntentKey {
        intent: "a",
        project: "p",
    };
    let child = ChildKey {
        child: "x",
        intent: "a",
        project: "p",
    };
    store
        .insert_typed("resources", &parent, "data", &doc("a"))
        .await
        .unwrap();
    store
        .insert_typed("resources", &child, "data", &doc("x"))
        .await
        .unwrap();

    let err = store.remove_typed("resources", &parent).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "{err}");

    store.remove_typed("resources", &child).await.unwrap();
    store.remove_typed("resources", &parent).await.unwrap();
    assert!(store.is_empty("resources"));
}

#[tokio::test]
async fn non_object_keys_are_rejected() {
    let store = MemStore::new();
    let err = store
        .insert_typed("resources", &"flat", "data", &doc("a"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err}");
}

#[tokio::test]
async fn exists_query_sees_secondary_key() {
    let store = MemStore::new();
    for (name, end) in [("s1", "left"), ("s2", "right"), ("s3", "left")] {
        store
            .insert(
                "resources",
                &json!({"sfcIntent": "chain", "selector": name}),
                Some(&json!({"chainEnd": end})),
                "data",
                &json!({"name": name}),
            )
            .await
            .unwrap();
    }
    store
        .insert(
            "resources",
            &json!({"sfcIntent": "chain", "network": "n1"}),
            Some(&json!({"chainEnd": "left"})),
            "data",
            &json!({"name": "n1"}),
        )
        .await
        .unwrap();

    let query = json!({"sfcIntent": "chain", "selector": {"$exists": true}, "chainEnd": "left"});
    let found = store
        .find("resources", &query, "data")
        .await
        .unwrap()
        .iter()
        .map(|raw| unmarshal::<Doc>(raw).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(found, vec![doc("s1"), doc("s3")]);

    // Plain queries ignore the secondary key.
    let found = store
        .find("resources", &json!({"sfcIntent": "chain", "chainEnd": "left"}), "data")
        .await
        .unwrap();
    assert!(found.is_empty());
}
