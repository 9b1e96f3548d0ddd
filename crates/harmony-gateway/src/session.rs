use std::sync::Arc;

use tracing::{debug, info, warn};

use harmony_core::mood::chart;
use harmony_core::{
    BreathingMode, BreathingSession, CommunityDirectory, CoreError, GratitudeJournal, GroupChat,
    MoodLog, REACTION_EMOJIS, ReflectionFeed, SeedOutcome, TickOutcome, ensure_defaults,
};
use harmony_store::{AppendLog, DocumentStore};
use harmony_types::api::CurrentUser;
use harmony_types::events::{GatewayCommand, GatewayEvent};

/// Which live projection produced the last update.
enum Changed {
    Communities,
    Feed,
    Chat,
}

/// Everything one signed-in user has open on one connection.
pub struct Session {
    user: CurrentUser,
    store: Arc<dyn DocumentStore>,
    directory: CommunityDirectory,
    feed: ReflectionFeed,
    chat: GroupChat,
    moods: MoodLog,
    gratitude: GratitudeJournal,
    breathing: BreathingSession,
}

impl Session {
    pub fn new<S>(store: Arc<S>, user: CurrentUser) -> Self
    where
        S: DocumentStore + AppendLog + 'static,
    {
        Self {
            user,
            store: store.clone(),
            directory: CommunityDirectory::new(store.clone()),
            feed: ReflectionFeed::new(store.clone()),
            chat: GroupChat::new(store.clone()),
            moods: MoodLog::new(store.clone()),
            gratitude: GratitudeJournal::new(store),
            breathing: BreathingSession::default(),
        }
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    /// Optionally seed an empty store, then start following the community
    /// directory. Returns the events to send before anything else.
    pub async fn start(&mut self, seed_defaults: bool) -> Vec<GatewayEvent> {
        let mut events = vec![GatewayEvent::Ready {
            user_id: self.user.id.clone(),
            display_name: self.user.author_name(),
            reactions: REACTION_EMOJIS.iter().map(|e| e.to_string()).collect(),
        }];

        if seed_defaults {
            match ensure_defaults(self.store.as_ref(), &self.user).await {
                Ok(SeedOutcome::Seeded { community_id, .. }) => {
                    info!("Seeded default community {} for {}", community_id, self.user.id)
                }
                Ok(SeedOutcome::AlreadySeeded) => {}
                Err(e) => events.push(self.error_event(e)),
            }
        }

        if let Err(e) = self.directory.watch().await {
            events.push(self.error_event(e));
        }
        events.push(self.breathing_event());
        events
    }

    pub fn is_breathing(&self) -> bool {
        self.breathing.is_running()
    }

    /// Run one client command. Failures come back as an `Error` event and
    /// never end the session.
    pub async fn handle(&mut self, cmd: GatewayCommand) -> Vec<GatewayEvent> {
        match self.dispatch(cmd).await {
            Ok(events) => events,
            Err(e) => vec![self.error_event(e)],
        }
    }

    async fn dispatch(&mut self, cmd: GatewayCommand) -> Result<Vec<GatewayEvent>, CoreError> {
        let user = &self.user;
        match cmd {
            GatewayCommand::CreateCommunity { name } => {
                self.directory.create(user, &name).await?;
                Ok(vec![])
            }
            GatewayCommand::JoinCommunity { community_id } => {
                self.directory.join(user, &community_id).await?;
                Ok(vec![])
            }
            GatewayCommand::LeaveCommunity { community_id } => {
                self.directory.leave(user, &community_id).await?;
                Ok(vec![])
            }

            GatewayCommand::SelectGroup { group_id } => {
                info!("{} selected group {}", user.id, group_id);
                // Feed and chat follow the same group, or neither does.
                if let Err(e) = self.chat.open(&group_id).await {
                    self.feed.unsubscribe();
                    return Err(e);
                }
                if let Err(e) = self.feed.subscribe(&group_id).await {
                    self.chat.close();
                    return Err(e);
                }
                Ok(vec![])
            }
            GatewayCommand::LeaveGroup => {
                self.feed.unsubscribe();
                self.chat.close();
                Ok(vec![])
            }

            GatewayCommand::Post { text } => {
                self.feed.post(user, &text).await?;
                Ok(vec![])
            }
            GatewayCommand::React { post_id, emoji, atomic } => {
                if atomic {
                    self.feed.react_atomic(&post_id, &emoji).await?;
                    Ok(vec![])
                } else {
                    self.feed.react(&post_id, &emoji).await?;
                    // The local count already moved; show it without waiting.
                    Ok(self.feed_event().into_iter().collect())
                }
            }
            GatewayCommand::Comment { post_id, text } => {
                self.feed.comment(user, &post_id, &text).await?;
                Ok(vec![])
            }
            GatewayCommand::SendChat { text } => {
                self.chat.send(user, &text).await?;
                Ok(vec![])
            }

            GatewayCommand::RecordMood { mood, note } => {
                self.moods.record(user, &mood, &note).await?;
                Ok(vec![self.mood_history(7).await?])
            }
            GatewayCommand::LoadMoodHistory { window_days } => Ok(vec![self.mood_history(window_days).await?]),
            GatewayCommand::RecordGratitude { entry } => {
                self.gratitude.record(user, &entry).await?;
                Ok(vec![self.gratitude_event().await?])
            }
            GatewayCommand::LoadGratitude => Ok(vec![self.gratitude_event().await?]),

            GatewayCommand::BreathingSelect { mode } => match BreathingMode::find(&mode) {
                Some(mode) => {
                    self.breathing.select_mode(mode);
                    Ok(vec![self.breathing_event()])
                }
                None => {
                    debug!("{} asked for unknown breathing mode '{}'", user.id, mode);
                    Ok(vec![GatewayEvent::Error {
                        message: format!("Unknown breathing mode '{}'.", mode),
                    }])
                }
            },
            GatewayCommand::BreathingStart => {
                self.breathing.start();
                Ok(vec![self.breathing_event()])
            }
            GatewayCommand::BreathingReset => {
                self.breathing.reset();
                Ok(vec![self.breathing_event()])
            }
        }
    }

    /// Advance the breathing session by one second.
    pub fn tick(&mut self) -> Option<GatewayEvent> {
        match self.breathing.tick() {
            TickOutcome::Idle => None,
            _ => Some(self.breathing_event()),
        }
    }

    /// Wait for the next snapshot on any live projection. Pends while none
    /// is attached.
    pub async fn next_update(&mut self) -> Option<GatewayEvent> {
        let changed = tokio::select! {
            r = self.directory.next_update() => r.map(|_| Changed::Communities),
            r = self.feed.next_update() => r.map(|_| Changed::Feed),
            r = self.chat.next_update() => r.map(|_| Changed::Chat),
        };

        match changed {
            Ok(Changed::Communities) => Some(self.communities_event()),
            Ok(Changed::Feed) => self.feed_event(),
            Ok(Changed::Chat) => self.chat_event(),
            Err(e) => Some(self.error_event(e)),
        }
    }

    fn communities_event(&self) -> GatewayEvent {
        GatewayEvent::Communities {
            communities: self.directory.list_all().to_vec(),
            mine: self
                .directory
                .list_mine(&self.user)
                .into_iter()
                .map(|c| c.id.clone())
                .collect(),
        }
    }

    fn feed_event(&self) -> Option<GatewayEvent> {
        let group_id = self.feed.group_id()?;
        Some(GatewayEvent::Feed {
            group_id: group_id.to_string(),
            posts: self.feed.posts().to_vec(),
        })
    }

    fn chat_event(&self) -> Option<GatewayEvent> {
        let group_id = self.chat.group_id()?;
        Some(GatewayEvent::Chat {
            group_id: group_id.to_string(),
            messages: self.chat.messages().to_vec(),
        })
    }

    fn breathing_event(&self) -> GatewayEvent {
        let session = &self.breathing;
        GatewayEvent::Breathing {
            mode: session.mode().key.to_string(),
            step_label: session.current_step().label.to_string(),
            step_index: session.step_index(),
            seconds_remaining: session.seconds_remaining(),
            progress: session.progress(),
            running: session.is_running(),
        }
    }

    async fn mood_history(&self, window_days: u32) -> Result<GatewayEvent, CoreError> {
        let entries = self.moods.history(&self.user, window_days).await?;
        let chart = chart(&entries).into_iter().map(|(_, value)| value).collect();
        Ok(GatewayEvent::MoodHistory { entries, chart })
    }

    async fn gratitude_event(&self) -> Result<GatewayEvent, CoreError> {
        let entries = self.gratitude.entries(&self.user).await?;
        Ok(GatewayEvent::Gratitude { entries })
    }

    fn error_event(&self, e: CoreError) -> GatewayEvent {
        if e.is_validation() {
            debug!("{} rejected input: {}", self.user.id, e);
        } else {
            warn!("{} operation failed: {}", self.user.id, e);
        }
        GatewayEvent::Error {
            message: e.display_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use harmony_core::feed::POSTS;
    use harmony_store::{Document, FieldUpdate, LogEntry, NewDocument, Query, SqliteStore, StoreError, Subscription};
    use serde_json::Value;

    fn session() -> Session {
        Session::new(Arc::new(SqliteStore::in_memory().unwrap()), CurrentUser::new("u1"))
    }

    /// SQLite store whose post queries or chat logs can be made to fail.
    struct FlakyStore {
        inner: SqliteStore,
        feed_fails_after_first: bool,
        chat_refuses: bool,
    }

    impl FlakyStore {
        fn new(feed_fails_after_first: bool, chat_refuses: bool) -> Arc<Self> {
            Arc::new(Self {
                inner: SqliteStore::in_memory().unwrap(),
                feed_fails_after_first,
                chat_refuses,
            })
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn create(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError> {
            self.inner.create(collection, doc).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn read_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
            self.inner.read_all(collection).await
        }

        async fn update(&self, collection: &str, id: &str, updates: Vec<FieldUpdate>) -> Result<(), StoreError> {
            self.inner.update(collection, id, updates).await
        }

        async fn live_query(&self, query: Query) -> Result<Subscription<Vec<Document>>, StoreError> {
            if !(self.feed_fails_after_first && query.collection == POSTS) {
                return self.inner.live_query(query).await;
            }
            let (tx, sub) = Subscription::channel();
            tx.send(Ok(Vec::new()));
            tx.send(Err(StoreError::Backend(anyhow::anyhow!("permission denied"))));
            Ok(sub)
        }
    }

    #[async_trait]
    impl AppendLog for FlakyStore {
        async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
            self.inner.push(path, value).await
        }

        async fn subscribe(&self, path: &str) -> Result<Subscription<Vec<LogEntry>>, StoreError> {
            if self.chat_refuses {
                return Err(StoreError::Backend(anyhow::anyhow!("permission denied")));
            }
            self.inner.subscribe(path).await
        }
    }

    async fn next_event(session: &mut Session) -> GatewayEvent {
        tokio::time::timeout(Duration::from_secs(2), session.next_update())
            .await
            .expect("no update")
            .expect("update without event")
    }

    #[tokio::test]
    async fn start_sends_ready_first_and_seeds() {
        let mut s = session();
        let events = s.start(true).await;
        match &events[0] {
            GatewayEvent::Ready { user_id, reactions, .. } => {
                assert_eq!(user_id, "u1");
                assert_eq!(reactions.len(), 5);
                assert_eq!(reactions[0], "👍");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(events.last(), Some(GatewayEvent::Breathing { running: false, .. })));

        match next_event(&mut s).await {
            GatewayEvent::Communities { communities, mine } => {
                assert_eq!(communities.len(), 1);
                assert_eq!(communities[0].name, "Welcome Community");
                assert_eq!(mine, vec![communities[0].id.clone()]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failures_become_error_events() {
        let mut s = session();
        let events = s.handle(GatewayCommand::Post { text: "hello".into() }).await;
        assert!(matches!(&events[..], [GatewayEvent::Error { message }] if message.contains("Join a community")));

        let events = s.handle(GatewayCommand::CreateCommunity { name: " ".into() }).await;
        assert!(matches!(&events[..], [GatewayEvent::Error { .. }]));

        let events = s.handle(GatewayCommand::BreathingSelect { mode: "nope".into() }).await;
        assert!(matches!(&events[..], [GatewayEvent::Error { .. }]));
    }

    #[tokio::test]
    async fn selecting_a_group_streams_its_feed() {
        let mut s = session();
        s.handle(GatewayCommand::SelectGroup { group_id: "g1".into() }).await;
        assert!(s.handle(GatewayCommand::Post { text: "Grateful".into() }).await.is_empty());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            assert!(tokio::time::Instant::now() < deadline, "feed never showed the post");
            if let GatewayEvent::Feed { group_id, posts } = next_event(&mut s).await {
                assert_eq!(group_id, "g1");
                if posts.len() == 1 {
                    assert_eq!(posts[0].text, "Grateful");
                    break;
                }
            }
        }
    }

    #[tokio::test]
    async fn breathing_commands_report_state() {
        let mut s = session();
        let events = s.handle(GatewayCommand::BreathingSelect { mode: "energize".into() }).await;
        assert!(matches!(&events[..], [GatewayEvent::Breathing { seconds_remaining: 2, running: false, .. }]));
        assert!(s.tick().is_none());

        s.handle(GatewayCommand::BreathingStart).await;
        assert!(s.is_breathing());
        assert!(matches!(s.tick(), Some(GatewayEvent::Breathing { seconds_remaining: 1, .. })));

        s.handle(GatewayCommand::BreathingReset).await;
        assert!(!s.is_breathing());
    }

    #[tokio::test]
    async fn recorded_mood_comes_back_in_history() {
        let mut s = session();
        let events = s
            .handle(GatewayCommand::RecordMood { mood: "calm".into(), note: String::new() })
            .await;
        match &events[..] {
            [GatewayEvent::MoodHistory { entries, chart }] => {
                assert_eq!(entries.len(), 1);
                assert_eq!(chart, &vec![3u8]);
            }
            other => panic!("unexpected events: {:?}", other),
        }

        let events = s
            .handle(GatewayCommand::RecordMood { mood: "grumpy".into(), note: String::new() })
            .await;
        assert!(matches!(&events[..], [GatewayEvent::Error { .. }]));
    }

    #[tokio::test]
    async fn gratitude_round_trip() {
        let mut s = session();
        let events = s.handle(GatewayCommand::RecordGratitude { entry: "Tea".into() }).await;
        assert!(matches!(&events[..], [GatewayEvent::Gratitude { entries }] if entries.len() == 1));
        let events = s.handle(GatewayCommand::RecordGratitude { entry: "".into() }).await;
        assert!(matches!(&events[..], [GatewayEvent::Error { .. }]));
    }

    #[tokio::test]
    async fn feed_failure_becomes_an_error_event_and_stays_down() {
        let mut s = Session::new(FlakyStore::new(true, false), CurrentUser::new("u1"));
        assert!(s.handle(GatewayCommand::SelectGroup { group_id: "g1".into() }).await.is_empty());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            assert!(tokio::time::Instant::now() < deadline, "feed error never surfaced");
            if let GatewayEvent::Error { message } = next_event(&mut s).await {
                assert!(message.contains("Live updates stopped"));
                break;
            }
        }
        assert!(!s.feed.is_live());
        // Chat keeps streaming; the feed is not re-subscribed behind the user's back.
        assert_eq!(s.chat.group_id(), Some("g1"));
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(100), s.next_update()).await {
            assert!(!matches!(event, GatewayEvent::Feed { .. } | GatewayEvent::Error { .. }));
        }
        assert!(!s.feed.is_live());
    }

    #[tokio::test]
    async fn chat_failure_leaves_no_group_half_open() {
        let mut s = Session::new(FlakyStore::new(false, true), CurrentUser::new("u1"));
        let events = s.handle(GatewayCommand::SelectGroup { group_id: "g1".into() }).await;
        assert!(matches!(&events[..], [GatewayEvent::Error { message }] if message.contains("Live updates stopped")));
        assert!(!s.feed.is_live());
        assert_eq!(s.feed.group_id(), None);
        assert_eq!(s.chat.group_id(), None);

        let events = s.handle(GatewayCommand::Post { text: "hello".into() }).await;
        assert!(matches!(&events[..], [GatewayEvent::Error { message }] if message.contains("Join a community")));
    }
}
