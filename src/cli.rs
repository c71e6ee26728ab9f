use std::path::Path;

use anyhow::{Result, bail};
use colored::*;
use defi_chat::{
    ChatMessage, ChatRole, CompletionClient, CompletionError, Config, ConversationStore, Reply,
    StoreEvent, Submission,
};

/// What a one-shot question left behind.
#[derive(Debug)]
pub struct AskOutcome {
    pub transcript: Vec<ChatMessage>,
    /// Set when the reply in the transcript is the fallback for a failed request
    pub failure: Option<CompletionError>,
}

/// Submit one question through a fresh store and resolve it. `on_message`
/// sees each transcript entry as it is appended. A failed request is not an
/// error here; it shows up as the fallback reply plus `failure`.
pub async fn run_ask(
    client: &CompletionClient,
    question: &str,
    mut on_message: impl FnMut(&ChatMessage) + Send + 'static,
) -> Result<AskOutcome> {
    let mut store = ConversationStore::empty();
    store.subscribe(move |event| {
        if let StoreEvent::Appended(msg) = event {
            on_message(msg);
        }
    });

    let Some(Submission { ticket, history }) = store.submit(question) else {
        bail!("Question is empty");
    };

    let reply = client.complete(&history).await;
    let failure = match &reply {
        Reply::Failed(err) => Some(err.clone()),
        Reply::Text(_) => None,
    };
    store.resolve(ticket, reply);

    Ok(AskOutcome {
        transcript: store.history().to_vec(),
        failure,
    })
}

pub async fn ask(client: CompletionClient, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question is empty");
    }

    println!("🤖 Asking {}...\n", client.model().bold().magenta());
    let outcome = run_ask(&client, question, print_message).await?;

    if let Some(err) = outcome.failure {
        eprintln!("{}: {}", "Request failed".red(), err);
        if err == CompletionError::MissingCredential {
            eprintln!(
                "Set {} or add \"api_key\" to the config file",
                defi_chat::config::API_KEY_ENV.bold()
            );
        }
    }
    Ok(())
}

fn print_message(msg: &ChatMessage) {
    let time = msg.timestamp.with_timezone(&chrono::Local).format("%H:%M");
    let label = match msg.role {
        ChatRole::User => msg.role.label().bold().cyan(),
        ChatRole::Assistant => msg.role.label().bold().yellow(),
    };
    println!("{} {}", label, time.to_string().dimmed());
    println!("{}\n", msg.content);
}

/// Human-readable settings. Reports whether a credential exists, never its value.
pub fn config_report(config: &Config, path: &Path) -> String {
    let credential = if config.api_key().is_some() {
        "present".green()
    } else {
        "missing".red()
    };

    let mut report = String::new();
    report.push_str(&format!("\n{}\n", "⚙️  DeFi Chat Configuration".bold().blue()));
    report.push_str(&format!("{}\n", "=".repeat(30).dimmed()));
    report.push_str(&format!("Config file: {}\n", path.display()));
    report.push_str(&format!("Model:       {}\n", config.model().green()));
    report.push_str(&format!("Endpoint:    {}\n", config.endpoint()));
    report.push_str(&format!("API key:     {}\n", credential));
    report
}

pub fn show_config(config: &Config) -> Result<()> {
    print!("{}", config_report(config, &Config::config_path()?));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use defi_chat::FALLBACK_REPLY;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CompletionClient {
        CompletionClient::new(Some("test-key".into()))
            .with_endpoint(format!("{}/v1/chat/completions", server.uri()))
    }

    #[tokio::test]
    async fn ask_success_returns_question_and_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "A DAO is..."}}]
            })))
            .mount(&server)
            .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let outcome = run_ask(&client_for(&server), "What is a DAO?", move |msg| {
            sink.lock().unwrap().push(msg.content.clone());
        })
        .await
        .unwrap();

        assert!(outcome.failure.is_none());
        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(outcome.transcript[0].role, ChatRole::User);
        assert_eq!(outcome.transcript[1].content, "A DAO is...");
        assert_eq!(*seen.lock().unwrap(), vec!["What is a DAO?", "A DAO is..."]);
    }

    #[tokio::test]
    async fn ask_server_error_still_succeeds_with_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let outcome = run_ask(&client_for(&server), "gm", |_| {}).await.unwrap();

        assert_eq!(outcome.failure, Some(CompletionError::Service { status: 500 }));
        assert_eq!(outcome.transcript.len(), 2);
        assert_eq!(outcome.transcript[1].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn ask_without_credential_still_succeeds_with_fallback() {
        let client = CompletionClient::new(None).with_endpoint("http://127.0.0.1:1/v1/chat/completions");

        let outcome = run_ask(&client, "gm", |_| {}).await.unwrap();

        assert_eq!(outcome.failure, Some(CompletionError::MissingCredential));
        assert_eq!(outcome.transcript[1].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn ask_blank_question_is_rejected() {
        let client = CompletionClient::new(None);
        assert!(run_ask(&client, "   ", |_| {}).await.is_err());
        assert!(ask(client, "").await.is_err());
    }

    #[test]
    fn config_report_never_shows_the_key() {
        let config = Config {
            api_key: Some("sk-file-secret-123".into()),
            model: Some("gpt-4o-mini".into()),
            ..Config::default()
        };

        let report = config_report(&config, Path::new("/tmp/defi-chat/config.json"));

        assert!(!report.contains("sk-file-secret-123"));
        if let Ok(env_key) = std::env::var(defi_chat::config::API_KEY_ENV) {
            if !env_key.trim().is_empty() {
                assert!(!report.contains(env_key.as_str()));
            }
        }
        assert!(report.contains("present"));
        assert!(report.contains("gpt-4o-mini"));
        assert!(report.contains("/tmp/defi-chat/config.json"));
    }
}
