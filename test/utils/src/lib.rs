#![allow(clippy::needless_return)]

use serde_json::json;
use tokio::net::TcpListener;

/// A model answer shaped the way the agricultural prompt asks for, in Tamil.
pub fn tamil_answer_fixture() -> &'static str {
    return r#"
**TOPIC IDENTIFICATION**
இந்த கேள்வி நெல் நடவு பருவத்தைப் பற்றியது.

**STEP-BY-STEP GUIDANCE**
1. பருவமழை தொடங்கும் ஜூன் மாதத்தில் நாற்றங்கால் தயார் செய்யவும்.
2. 25 நாட்கள் ஆன நாற்றுகளை நடவு செய்யவும்.

**KEY CONSIDERATIONS**
• வயலில் தண்ணீர் தேங்கி நிற்க வேண்டும்.
• நல்ல விதைகளைத் தேர்வு செய்யவும்.

**ADDITIONAL RESOURCES**
• அருகிலுள்ள வேளாண் அலுவலரை அணுகவும்.
"#
    .trim();
}

/// Body returned by `models/<model>:generateContent` with the text split
/// over the given parts.
pub fn generate_content_fixture(parts: &[&str]) -> String {
    let parts = parts
        .iter()
        .map(|text| {
            return json!({ "text": text });
        })
        .collect::<Vec<_>>();

    return json!({
        "candidates": [{
            "content": { "role": "model", "parts": parts },
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {
            "promptTokenCount": 412,
            "candidatesTokenCount": 128,
            "totalTokenCount": 540
        }
    })
    .to_string();
}

/// Body returned when the prompt itself was rejected by safety filters.
pub fn blocked_prompt_fixture() -> String {
    return json!({
        "promptFeedback": { "blockReason": "SAFETY" }
    })
    .to_string();
}

/// Body returned by `models/<model>` metadata lookups.
pub fn model_metadata_fixture(name: &str) -> String {
    return json!({
        "name": format!("models/{name}"),
        "displayName": name,
        "supportedGenerationMethods": ["generateContent", "countTokens"]
    })
    .to_string();
}

/// Starts a server that accepts connections and never answers them. Returns
/// its base URL. Must be called from inside a tokio runtime.
pub async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = vec![];
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    return format!("http://{addr}");
}
