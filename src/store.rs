use crate::model::{EntityId, MatchResult};
use crate::wire::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Client-side cache of one REST collection.
///
/// Collections are replaced wholesale on fetch and patched on create, update
/// and delete. A failure keeps whatever was loaded before and parks the
/// message in `error` until the view dismisses it.
#[derive(Debug, Clone)]
pub struct ResourceStore<R> {
    pub items: Vec<R>,
    pub current: Option<R>,
    pub status: LoadStatus,
    pub error: Option<String>,
    resting: LoadStatus,
}

impl<R> Default for ResourceStore<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current: None,
            status: LoadStatus::Idle,
            error: None,
            resting: LoadStatus::Idle,
        }
    }
}

impl<R: Resource> ResourceStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        if self.status != LoadStatus::Loading {
            self.resting = self.status;
        }
        self.status = LoadStatus::Loading;
        self.error = None;
    }

    /// Abandons an in-flight load: the store goes back to the status it had
    /// before `begin`, keeping its items. A failure whose message `begin`
    /// already cleared comes back as `Idle`.
    pub fn settle(&mut self) {
        if self.status != LoadStatus::Loading {
            return;
        }
        self.status = match self.resting {
            LoadStatus::Failed | LoadStatus::Loading => LoadStatus::Idle,
            other => other,
        };
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    pub fn finish_fetch(&mut self, items: Vec<R>) {
        self.items = items;
        self.status = LoadStatus::Succeeded;
    }

    pub fn finish_fetch_one(&mut self, item: R) {
        self.current = Some(item);
        self.status = LoadStatus::Succeeded;
    }

    pub fn finish_create(&mut self, item: R) {
        self.items.push(item);
        self.status = LoadStatus::Succeeded;
    }

    pub fn finish_update(&mut self, item: R) {
        if let Some(slot) = self.items.iter_mut().find(|it| it.id() == item.id()) {
            *slot = item.clone();
        }
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.id() == item.id())
        {
            self.current = Some(item);
        }
        self.status = LoadStatus::Succeeded;
    }

    pub fn finish_delete(&mut self, id: &EntityId) {
        self.items.retain(|it| it.id() != id);
        if self.current.as_ref().is_some_and(|c| c.id() == id) {
            self.current = None;
        }
        self.status = LoadStatus::Succeeded;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = LoadStatus::Failed;
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
        if self.status == LoadStatus::Failed {
            self.status = LoadStatus::Idle;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn get(&self, id: &EntityId) -> Option<&R> {
        self.items.iter().find(|it| it.id() == id)
    }
}

impl ResourceStore<MatchResult> {
    /// A fixture-scoped result delete drops every result of that fixture.
    pub fn finish_delete_for_fixture(&mut self, fixture_id: &EntityId) {
        self.items.retain(|r| &r.fixture_id != fixture_id);
        if self
            .current
            .as_ref()
            .is_some_and(|c| &c.fixture_id == fixture_id)
        {
            self.current = None;
        }
        self.status = LoadStatus::Succeeded;
    }

    /// Results saved through the fixture-scoped endpoint may come back under a
    /// different id than the listed one, so they are matched by fixture.
    pub fn upsert_for_fixture(&mut self, result: MatchResult) {
        match self
            .items
            .iter_mut()
            .find(|r| r.fixture_id == result.fixture_id)
        {
            Some(slot) => *slot = result,
            None => self.items.push(result),
        }
        self.status = LoadStatus::Succeeded;
    }

    pub fn for_fixture(&self, fixture_id: &EntityId) -> Option<&MatchResult> {
        self.items.iter().find(|r| &r.fixture_id == fixture_id)
    }
}
