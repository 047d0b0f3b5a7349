use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::slack::MessagePoster;
use crate::weather::WeatherProvider;

/// Posted when a recognized command's handler fails.
pub const FALLBACK_REPLY: &str = "몰라 안알랴쥼 파업할거야";

/// A named bot command. Handlers produce the reply text; posting is the
/// dispatcher's job.
#[async_trait]
pub trait Command: Send + Sync {
    async fn run(&self) -> Result<String>;
}

/// Looks up today's air quality and formats it as a sentence.
pub struct WeatherCommand {
    provider: Arc<dyn WeatherProvider>,
}

impl WeatherCommand {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Command for WeatherCommand {
    async fn run(&self) -> Result<String> {
        Ok(self.provider.current_conditions().await?)
    }
}

/// Maps trigger phrases to handlers. Registration order is preserved so
/// the help text lists commands deterministically.
pub struct Dispatcher {
    commands: Vec<(String, Box<dyn Command>)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn register(&mut self, trigger: impl Into<String>, command: Box<dyn Command>) {
        self.commands.push((trigger.into(), command));
    }

    fn help_text(&self) -> String {
        let triggers: Vec<String> = self
            .commands
            .iter()
            .map(|(trigger, _)| format!("*{trigger}*"))
            .collect();
        format!(
            "못알아먹겠다!! 한번 이렇게 말해보지 않을래? {}.",
            triggers.join(", ")
        )
    }

    /// Resolve the command text to a reply and post it. Exactly one
    /// message goes to the channel: the handler's output, the fallback
    /// when the handler fails, or the help text for unrecognized input.
    pub async fn dispatch(
        &self,
        command: &str,
        channel: &str,
        poster: &dyn MessagePoster,
    ) -> Result<()> {
        let reply = match self
            .commands
            .iter()
            .find(|(trigger, _)| trigger.as_str() == command)
        {
            Some((trigger, handler)) => match handler.run().await {
                Ok(text) => text,
                Err(e) => {
                    warn!("command '{}' failed: {:#}", trigger, e);
                    FALLBACK_REPLY.to_string()
                }
            },
            None => self.help_text(),
        };
        poster.post_message(channel, &reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::Mutex;

    use crate::weather::WeatherError;

    const TRIGGER: &str = "오늘의날씨";

    struct RecordingPoster {
        posts: Mutex<Vec<(String, String)>>,
    }

    impl RecordingPoster {
        fn new() -> Self {
            Self {
                posts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MessagePoster for RecordingPoster {
        async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
            self.posts
                .lock()
                .await
                .push((channel.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct StubWeather {
        result: Result<String, ()>,
    }

    #[async_trait]
    impl WeatherProvider for StubWeather {
        async fn current_conditions(&self) -> Result<String, WeatherError> {
            match &self.result {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(WeatherError::MissingField("Content")),
            }
        }
    }

    fn dispatcher_with_stub(result: Result<String, ()>) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(
            TRIGGER,
            Box::new(WeatherCommand::new(Arc::new(StubWeather { result }))),
        );
        dispatcher
    }

    #[tokio::test]
    async fn recognized_command_posts_the_computed_response() {
        let dispatcher = dispatcher_with_stub(Ok("강남의 미세먼지 수치는 *좋음* 입니다.".into()));
        let poster = RecordingPoster::new();

        dispatcher.dispatch(TRIGGER, "C0GEN", &poster).await.unwrap();

        let posts = poster.posts.lock().await;
        assert_eq!(
            *posts,
            vec![(
                "C0GEN".to_string(),
                "강남의 미세먼지 수치는 *좋음* 입니다.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn unrecognized_command_posts_help_listing_the_trigger() {
        let dispatcher = dispatcher_with_stub(Ok("unused".into()));
        let poster = RecordingPoster::new();

        dispatcher
            .dispatch("내일의날씨", "C0GEN", &poster)
            .await
            .unwrap();

        let posts = poster.posts.lock().await;
        assert_eq!(posts.len(), 1);
        assert!(posts[0].1.contains(&format!("*{TRIGGER}*")));
        assert!(posts[0].1.starts_with("못알아먹겠다!!"));
    }

    #[tokio::test]
    async fn handler_failure_posts_the_fallback_reply() {
        let dispatcher = dispatcher_with_stub(Err(()));
        let poster = RecordingPoster::new();

        dispatcher.dispatch(TRIGGER, "C0GEN", &poster).await.unwrap();

        let posts = poster.posts.lock().await;
        assert_eq!(
            *posts,
            vec![("C0GEN".to_string(), FALLBACK_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn exact_match_only() {
        let dispatcher = dispatcher_with_stub(Ok("unused".into()));
        let poster = RecordingPoster::new();

        dispatcher
            .dispatch("오늘의날씨 알려줘", "C0GEN", &poster)
            .await
            .unwrap();

        let posts = poster.posts.lock().await;
        assert!(posts[0].1.starts_with("못알아먹겠다!!"));
    }

    #[tokio::test]
    async fn help_lists_every_registered_trigger_in_order() {
        let mut dispatcher = dispatcher_with_stub(Ok("unused".into()));
        dispatcher.register(
            "미세먼지",
            Box::new(WeatherCommand::new(Arc::new(StubWeather {
                result: Ok("unused".into()),
            }))),
        );

        let help = dispatcher.help_text();
        let first = help.find("*오늘의날씨*").unwrap();
        let second = help.find("*미세먼지*").unwrap();
        assert!(first < second);
    }
}
