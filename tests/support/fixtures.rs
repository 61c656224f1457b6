//! JSON bodies shaped like the forum API.

use serde_json::{Value, json};

/// A listing page of `(id, score)` posts in `subreddit`.
pub fn listing(subreddit: &str, posts: &[(&str, i64)], after: Option<&str>) -> Value {
    let children: Vec<Value> = posts
        .iter()
        .map(|(id, score)| {
            json!({"kind": "t3", "data": {
                "id": id,
                "title": format!("Title {id}"),
                "selftext": format!("Body of {id}"),
                "permalink": format!("/r/{subreddit}/comments/{id}/slug/"),
                "author": "poster",
                "score": score,
                "num_comments": 2,
                "created_utc": 1_714_564_800.0
            }})
        })
        .collect();
    json!({"kind": "Listing", "data": {"after": after, "children": children}})
}

/// A thread response with `(author, score)` top-level replies.
pub fn thread(replies: &[(&str, i64)]) -> Value {
    let children: Vec<Value> = replies
        .iter()
        .map(|(author, score)| {
            json!({"kind": "t1", "data": {
                "author": author,
                "body": format!("reply from {author}"),
                "score": score
            }})
        })
        .collect();
    json!([
        {"kind": "Listing", "data": {"children": []}},
        {"kind": "Listing", "data": {"children": children}}
    ])
}

/// A Messages API answer with a single text block.
pub fn anthropic_message(text: &str) -> Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "model": "claude-haiku-4-5",
        "stop_reason": "end_turn"
    })
}
