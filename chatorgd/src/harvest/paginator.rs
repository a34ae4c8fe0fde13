use std::collections::VecDeque;
use std::future::Future;

use chatorg_core::{ApiError, ContainerPage, ItemRow, RowPage, SidebarEntry};
use futures_util::Stream;

use crate::pacing::Jitter;

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePosition {
    Offset { offset: u32, limit: u32 },
    Cursor(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub cursor: Option<String>,
    pub total: Option<u64>,
}

impl From<RowPage> for Page<ItemRow> {
    fn from(page: RowPage) -> Self {
        Self {
            rows: page.items,
            cursor: page.cursor,
            total: page.total,
        }
    }
}

impl From<ContainerPage> for Page<SidebarEntry> {
    fn from(page: ContainerPage) -> Self {
        Self {
            rows: page.items,
            cursor: page.cursor,
            total: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Open(PagePosition),
    /// The remote signalled the end of the data.
    Drained,
    /// The step cap tripped before the data ended.
    Capped,
    /// The caller stopped reading.
    Stopped,
}

/// Walks one endpoint page by page.
///
/// The walk is lazy and cannot be restarted: once a page is empty, the
/// remote reports no continuation, a fetch fails, or `max_steps` pages have
/// been requested, [`Paginator::next_page`] keeps returning `None`. Pages
/// after the first are preceded by a `pacing` delay.
pub struct Paginator<F> {
    fetch: F,
    state: State,
    steps: u32,
    max_steps: u32,
    pacing: Jitter,
}

impl<F, Fut, T> Paginator<F>
where
    F: FnMut(PagePosition) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    pub fn offset(page_size: u32, max_steps: u32, pacing: Jitter, fetch: F) -> Self {
        Self::starting_at(
            PagePosition::Offset {
                offset: 0,
                limit: page_size.max(1),
            },
            max_steps,
            pacing,
            fetch,
        )
    }

    pub fn cursor(max_steps: u32, pacing: Jitter, fetch: F) -> Self {
        Self::starting_at(PagePosition::Cursor(None), max_steps, pacing, fetch)
    }

    fn starting_at(position: PagePosition, max_steps: u32, pacing: Jitter, fetch: F) -> Self {
        Self {
            fetch,
            state: State::Open(position),
            steps: 0,
            max_steps,
            pacing,
        }
    }

    pub async fn next_page(&mut self) -> Result<Option<Page<T>>, ApiError> {
        let position = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Open(position) => position,
            finished => {
                self.state = finished;
                return Ok(None);
            }
        };
        if self.steps >= self.max_steps {
            tracing::debug!(steps = self.steps, "pagination step cap reached");
            self.state = State::Capped;
            return Ok(None);
        }
        if self.steps > 0 {
            self.pacing.wait().await;
        }
        self.steps += 1;

        let page = (self.fetch)(position.clone()).await?;
        self.state = match advance(&position, &page) {
            Some(next) => State::Open(next),
            None => State::Drained,
        };
        Ok(Some(page))
    }

    /// Ends the walk early; later calls return `None`.
    pub fn stop(&mut self) {
        if matches!(self.state, State::Open(_)) {
            self.state = State::Stopped;
        }
    }

    /// True once the remote reported that no more data exists.
    pub fn is_drained(&self) -> bool {
        self.state == State::Drained
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Flattens the remaining pages into a row stream.
    pub fn into_rows(self) -> impl Stream<Item = Result<T, ApiError>> {
        futures_util::stream::try_unfold((self, VecDeque::new()), Self::next_row)
    }

    async fn next_row(
        (mut pager, mut buffer): (Self, VecDeque<T>),
    ) -> Result<Option<(T, (Self, VecDeque<T>))>, ApiError> {
        loop {
            if let Some(row) = buffer.pop_front() {
                return Ok(Some((row, (pager, buffer))));
            }
            match pager.next_page().await? {
                Some(page) => buffer.extend(page.rows),
                None => return Ok(None),
            }
        }
    }
}

fn advance<T>(position: &PagePosition, page: &Page<T>) -> Option<PagePosition> {
    if page.rows.is_empty() {
        return None;
    }
    match position {
        PagePosition::Offset { offset, limit } => {
            let fetched = u32::try_from(page.rows.len()).unwrap_or(u32::MAX);
            (fetched >= *limit).then(|| PagePosition::Offset {
                offset: offset.saturating_add(fetched),
                limit: *limit,
            })
        }
        PagePosition::Cursor(current) => match page.cursor.as_deref() {
            Some(next) if !next.is_empty() && current.as_deref() != Some(next) => {
                Some(PagePosition::Cursor(Some(next.to_string())))
            }
            _ => None,
        },
    }
}
