//! Post-run coaching through a Gemini-style `generateContent` endpoint.
//!
//! A [`CoachConversation`] is opened for one saved run. It keeps the model
//! history (what is sent) apart from the transcript (what is shown): follow-up
//! questions are sent wrapped in a reminder of the run's numbers but shown as
//! typed. Requests are blocking and run on a worker thread; the reply comes
//! back through the app event queue as a [`CoachReply`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::history::{CoachingPayload, RunRecord};

const PLACEHOLDER_KEY_MARKER: &str = "PASTE_YOUR";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const SYSTEM_INSTRUCTION: &str = "\
You are STRINEX AI Coach, the built-in running coach and sports nutritionist of the Strinex GPS run tracker.

About Strinex:
- Live route tracking from device GPS
- Instant metrics: distance (km), pace (min/km), speed (km/h), duration
- Run history with the last 50 runs
- Weekly leaderboard

Your rules:
- Be energetic, motivating and supportive
- For diet: give specific meals, portions and timing (pre-run, post-run, rest day). Include both Indian and international options
- For recovery: hydration targets in litres, stretching routines, foam rolling, sleep hours
- For training: progression tips, tempo runs, intervals, easy runs, cross-training
- Always relate advice to improving the runner's Strinex stats
- Use short bullet points; the answer is read in a terminal
- Never give medical advice; suggest consulting a doctor for injuries";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoachError {
    #[error("coach API key not configured (set STRINEX_COACH_API_KEY or coach_api_key in config.json)")]
    NotConfigured,
    #[error("could not reach the coach service: {0}")]
    Http(String),
    #[error("coach service returned HTTP {status}")]
    Api { status: u16 },
    #[error("coach service returned no text")]
    EmptyReply,
}

impl From<reqwest::Error> for CoachError {
    fn from(e: reqwest::Error) -> Self {
        CoachError::Http(e.to_string())
    }
}

/// Result of one background request, tagged with the conversation it belongs to
#[derive(Debug)]
pub struct CoachReply {
    pub conversation: u64,
    pub result: Result<String, CoachError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn turn(role: Role, text: impl Into<String>) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_output_tokens: 2048,
            top_p: 0.95,
            top_k: 40,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub system_instruction: Content,
    pub contents: &'a [Content],
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Text of the first candidate, parts joined by newlines
pub fn parse_reply(body: &str) -> Result<String, CoachError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| CoachError::Http(e.to_string()))?;
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if text.is_empty() {
        Err(CoachError::EmptyReply)
    } else {
        Ok(text)
    }
}

pub fn analysis_prompt(run: &CoachingPayload) -> String {
    format!(
        "The user just completed a run on Strinex. Here are the exact details:

RUN STATS:
- Distance: {distance}
- Duration: {duration}
- Average Pace: {pace}
- Estimated Calories Burned: {calories}
- Date/Time: {timestamp}
- GPS Points Logged: {points}

Please provide a complete post-run analysis with all of the following sections:

1. Run Summary: rate this run (beginner/intermediate/advanced effort), highlight what went well
2. Post-Run Meal Plan: exactly what to eat right now for recovery (specific foods, portions). Include both Indian and international options
3. Hydration: how much water and electrolytes to drink based on the distance
4. Recovery Plan: stretches and rest recommendations for today
5. Next Run Tip: one actionable suggestion to improve next time

Be thorough and specific. Use the actual run numbers in your analysis.",
        distance = run.distance,
        duration = run.duration,
        pace = run.pace,
        calories = run.calories.as_deref().unwrap_or("N/A"),
        timestamp = non_empty_or_na(&run.timestamp),
        points = run.gps_points,
    )
}

pub fn follow_up_prompt(run: &CoachingPayload, question: &str) -> String {
    format!(
        "[Context: The user's last run was {} in {}, pace {}, calories {}. \
Always relate your answer to their running and fitness goals on Strinex.]\n\nUser's question: {}",
        run.distance,
        run.duration,
        run.pace,
        run.calories.as_deref().unwrap_or("N/A"),
        question
    )
}

fn is_loopback(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| {
            host == "localhost"
                || host
                    .parse::<std::net::IpAddr>()
                    .map(|ip| ip.is_loopback())
                    .unwrap_or(false)
        })
        .unwrap_or(false)
}

fn non_empty_or_na(s: &str) -> &str {
    if s.trim().is_empty() {
        "N/A"
    } else {
        s
    }
}

#[derive(Debug, Clone)]
pub struct CoachClient {
    api_key: Option<String>,
    api_url: String,
    generation: GenerationConfig,
}

impl CoachClient {
    pub fn new(api_key: Option<String>, api_url: impl Into<String>) -> Self {
        Self {
            api_key,
            api_url: api_url.into(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.coach_api_key.clone(), cfg.coach_api_url.clone())
    }

    /// A missing, blank or placeholder key means the coach is switched off
    pub fn is_configured(&self) -> bool {
        self.usable_key().is_some()
    }

    fn usable_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.contains(PLACEHOLDER_KEY_MARKER))
    }

    /// POST to the endpoint with the key as an encoded `key` query pair
    pub fn prepare(
        &self,
        http: &reqwest::blocking::Client,
        history: &[Content],
    ) -> Result<reqwest::blocking::RequestBuilder, CoachError> {
        let key = self.usable_key().ok_or(CoachError::NotConfigured)?;
        Ok(http
            .post(&self.api_url)
            .query(&[("key", key)])
            .json(&self.request_body(history)))
    }

    pub fn request_body<'a>(&self, history: &'a [Content]) -> GenerateRequest<'a> {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            contents: history,
            generation_config: self.generation.clone(),
        }
    }

    /// Blocking round trip; call from a worker thread
    pub fn generate(&self, history: &[Content]) -> Result<String, CoachError> {
        if !self.is_configured() {
            return Err(CoachError::NotConfigured);
        }
        let mut builder = reqwest::blocking::Client::builder().timeout(REQUEST_TIMEOUT);
        // local endpoints never go through the environment's proxy
        if is_loopback(&self.api_url) {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;

        tracing::info!(turns = history.len(), "requesting coach reply");
        let res = self.prepare(&http, history)?.send()?;

        let status = res.status();
        let body = res.text()?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %body, "coach API error");
            return Err(CoachError::Api {
                status: status.as_u16(),
            });
        }
        parse_reply(&body)
    }

    /// Run [`CoachClient::generate`] on a worker thread and hand the result to `deliver`
    pub fn spawn_generate<F>(&self, conversation: u64, history: Vec<Content>, deliver: F)
    where
        F: FnOnce(CoachReply) + Send + 'static,
    {
        let client = self.clone();
        std::thread::spawn(move || {
            let result = client.generate(&history);
            if let Err(e) = &result {
                tracing::warn!(error = %e, "coach request failed");
            }
            deliver(CoachReply {
                conversation,
                result,
            });
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    Runner,
    Coach,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub author: Author,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Analysis,
    FollowUp,
}

/// Coaching chat about one saved run
#[derive(Debug, Clone)]
pub struct CoachConversation {
    run_id: i64,
    payload: CoachingPayload,
    history: Vec<Content>,
    transcript: Vec<ChatMessage>,
    pending: Option<Pending>,
}

impl CoachConversation {
    pub fn new(run: &RunRecord) -> Self {
        Self {
            run_id: run.id,
            payload: run.coaching_payload(),
            history: Vec::new(),
            transcript: Vec::new(),
            pending: None,
        }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn payload(&self) -> &CoachingPayload {
        &self.payload
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Queue the automatic analysis. Returns the history to send.
    pub fn begin_analysis(&mut self) -> Option<Vec<Content>> {
        if self.is_busy() {
            return None;
        }
        self.history
            .push(Content::turn(Role::User, analysis_prompt(&self.payload)));
        self.pending = Some(Pending::Analysis);
        Some(self.history.clone())
    }

    /// Queue a follow-up. Blank input or an in-flight request is ignored.
    pub fn ask(&mut self, question: &str) -> Option<Vec<Content>> {
        let question = question.trim();
        if question.is_empty() || self.is_busy() {
            return None;
        }
        self.transcript.push(ChatMessage {
            author: Author::Runner,
            text: question.to_string(),
        });
        self.history.push(Content::turn(
            Role::User,
            follow_up_prompt(&self.payload, question),
        ));
        self.pending = Some(Pending::FollowUp);
        Some(self.history.clone())
    }

    /// Shown when no request can be made at all
    pub fn note_not_configured(&mut self) {
        self.coach_says(format!("⚠️ {}", CoachError::NotConfigured));
    }

    pub fn accept_reply(&mut self, result: Result<String, CoachError>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match result {
            Ok(text) => {
                self.history.push(Content::turn(Role::Model, text.clone()));
                self.coach_says(text);
            }
            Err(e) => {
                let text = match (pending, &e) {
                    (_, CoachError::NotConfigured) => format!("⚠️ {e}"),
                    (Pending::Analysis, CoachError::EmptyReply) => {
                        "⚠️ Could not generate analysis. Try asking a question below.".to_string()
                    }
                    (Pending::Analysis, _) => {
                        "⚠️ Could not connect to AI. Check your API key and try again.".to_string()
                    }
                    (Pending::FollowUp, CoachError::EmptyReply) => {
                        "⚠️ No response received. Please try again.".to_string()
                    }
                    (Pending::FollowUp, _) => {
                        "⚠️ Network error. Check your connection and try again.".to_string()
                    }
                };
                self.coach_says(text);
            }
        }
    }

    fn coach_says(&mut self, text: String) {
        self.transcript.push(ChatMessage {
            author: Author::Coach,
            text,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn record() -> RunRecord {
        RunRecord {
            id: 42,
            distance_km: 5.0,
            duration_seconds: 1800,
            pace_min_per_km: 6.0,
            calories_kcal: Some(350),
            completed_at_label: "16 Oct 2026, 07:30 AM".to_string(),
            gps_point_count: 120,
        }
    }

    /// One-shot HTTP server; returns its URL and the raw request body it saw
    fn serve_once(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
            }
            let mut req_body = vec![0u8; content_length];
            reader.read_exact(&mut req_body).unwrap();
            tx.send(String::from_utf8(req_body).unwrap()).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
        });
        (format!("http://{addr}/generate"), rx)
    }

    #[test]
    fn test_missing_or_placeholder_key_is_not_configured() {
        assert!(!CoachClient::new(None, "http://x").is_configured());
        assert!(!CoachClient::new(Some("  ".into()), "http://x").is_configured());
        assert!(!CoachClient::new(Some("PASTE_YOUR_KEY_HERE".into()), "http://x").is_configured());
        assert_eq!(
            CoachClient::new(None, "http://x").generate(&[]),
            Err(CoachError::NotConfigured)
        );
        assert!(CoachClient::new(Some("k".into()), "http://x").is_configured());
    }

    #[test]
    fn test_request_sends_key_as_query() {
        let http = reqwest::blocking::Client::new();
        let client = CoachClient::new(Some("abc123".into()), "https://host/models/m:generateContent");
        let req = client.prepare(&http, &[]).unwrap().build().unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(
            req.url().as_str(),
            "https://host/models/m:generateContent?key=abc123"
        );
    }

    #[test]
    fn test_request_key_is_encoded() {
        let http = reqwest::blocking::Client::new();
        let client = CoachClient::new(Some("a&b=c d".into()), "https://host/gen");
        let req = client.prepare(&http, &[]).unwrap().build().unwrap();
        assert_eq!(req.url().query(), Some("key=a%26b%3Dc+d"));
        let pairs: Vec<(String, String)> = req.url().query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("key".to_string(), "a&b=c d".to_string())]);
    }

    #[test]
    fn test_request_body_shape() {
        let client = CoachClient::new(Some("k".into()), "http://x");
        let history = vec![
            Content::turn(Role::User, "hi"),
            Content::turn(Role::Model, "hello"),
        ];
        let json = serde_json::to_value(client.request_body(&history)).unwrap();

        assert_eq!(
            json["system_instruction"]["parts"][0]["text"],
            SYSTEM_INSTRUCTION
        );
        assert!(json["system_instruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][1]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["temperature"], 0.8);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(json["generationConfig"]["topP"], 0.95);
        assert_eq!(json["generationConfig"]["topK"], 40);
    }

    #[test]
    fn test_parse_reply_joins_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Great run!"},{"text":"Drink water."}]}},{"content":{"parts":[{"text":"ignored"}]}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "Great run!\nDrink water.");
    }

    #[test]
    fn test_parse_reply_without_text() {
        assert_eq!(parse_reply(r#"{"candidates":[]}"#), Err(CoachError::EmptyReply));
        assert_eq!(parse_reply("{}"), Err(CoachError::EmptyReply));
        assert_eq!(
            parse_reply(r#"{"candidates":[{"content":{"parts":[{}]}}]}"#),
            Err(CoachError::EmptyReply)
        );
        assert_matches!(parse_reply("not json"), Err(CoachError::Http(_)));
    }

    #[test]
    fn test_analysis_prompt_uses_run_numbers() {
        let prompt = analysis_prompt(&record().coaching_payload());
        assert!(prompt.contains("- Distance: 5.00 km"));
        assert!(prompt.contains("- Duration: 30:00"));
        assert!(prompt.contains("- Average Pace: 6:00 /km"));
        assert!(prompt.contains("- Estimated Calories Burned: 350 kcal"));
        assert!(prompt.contains("- GPS Points Logged: 120"));
    }

    #[test]
    fn test_prompts_fill_missing_values() {
        let mut run = record();
        run.calories_kcal = None;
        run.completed_at_label = String::new();
        let payload = run.coaching_payload();
        assert!(analysis_prompt(&payload).contains("Calories Burned: N/A"));
        assert!(analysis_prompt(&payload).contains("Date/Time: N/A"));
        let follow = follow_up_prompt(&payload, "What should I eat?");
        assert!(follow.starts_with("[Context: The user's last run was 5.00 km in 30:00, pace 6:00 /km, calories N/A."));
        assert!(follow.ends_with("User's question: What should I eat?"));
    }

    #[test]
    fn test_conversation_flow() {
        let mut chat = CoachConversation::new(&record());
        assert_eq!(chat.run_id(), 42);

        let sent = chat.begin_analysis().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(chat.is_busy());
        assert!(chat.ask("another?").is_none());

        chat.accept_reply(Ok("Nice pace.".into()));
        assert!(!chat.is_busy());
        assert_eq!(chat.history().len(), 2);
        assert_eq!(chat.history()[1].role, Some(Role::Model));

        assert!(chat.ask("   ").is_none());
        let sent = chat.ask(" Rest day meals? ").unwrap();
        assert_eq!(sent.len(), 3);
        assert!(sent[2].parts[0].text.contains("User's question: Rest day meals?"));

        let shown: Vec<_> = chat.transcript().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(shown, vec!["Nice pace.", "Rest day meals?"]);
    }

    #[test]
    fn test_failed_reply_is_reported_in_transcript() {
        let mut chat = CoachConversation::new(&record());
        chat.begin_analysis();
        chat.accept_reply(Err(CoachError::Api { status: 500 }));
        assert!(!chat.is_busy());
        assert_eq!(
            chat.transcript().last().unwrap().text,
            "⚠️ Could not connect to AI. Check your API key and try again."
        );

        chat.ask("hello");
        chat.accept_reply(Err(CoachError::EmptyReply));
        assert_eq!(
            chat.transcript().last().unwrap().text,
            "⚠️ No response received. Please try again."
        );
        assert_eq!(chat.transcript().last().unwrap().author, Author::Coach);
    }

    #[test]
    fn test_stray_reply_is_ignored() {
        let mut chat = CoachConversation::new(&record());
        chat.accept_reply(Ok("late".into()));
        assert!(chat.transcript().is_empty());
        assert!(chat.history().is_empty());
    }

    #[test]
    fn test_generate_against_local_server() {
        let (url, seen) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"Keep going!"}]}}]}"#,
        );
        let client = CoachClient::new(Some("k".into()), url);
        let history = vec![Content::turn(Role::User, "hi")];

        assert_eq!(client.generate(&history).unwrap(), "Keep going!");
        let sent: serde_json::Value = serde_json::from_str(&seen.recv().unwrap()).unwrap();
        assert_eq!(sent["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_generate_reports_api_status() {
        let (url, _seen) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
        let client = CoachClient::new(Some("k".into()), url);
        assert_eq!(
            client.generate(&[Content::turn(Role::User, "hi")]),
            Err(CoachError::Api { status: 500 })
        );
    }

    #[test]
    fn test_spawn_generate_delivers_reply() {
        let client = CoachClient::new(None, "http://x");
        let (tx, rx) = mpsc::channel();
        client.spawn_generate(7, Vec::new(), move |reply| {
            tx.send(reply).unwrap();
        });
        let reply = rx.recv().unwrap();
        assert_eq!(reply.conversation, 7);
        assert_eq!(reply.result, Err(CoachError::NotConfigured));
    }
}
