use crate::error::Error;

/// Vertical bounds of the row area on every page, measured downward from the
/// top edge. Rows start below the table header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageFrame {
    pub content_top: f32,
    pub table_header_height: f32,
    pub bottom_limit: f32,
}

impl PageFrame {
    pub fn rows_top(&self) -> f32 {
        self.content_top + self.table_header_height
    }

    /// Height available to rows on an empty page.
    pub fn capacity(&self) -> f32 {
        self.bottom_limit - self.rows_top()
    }
}

/// Cursor position during one render pass. Local to a single report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageState {
    pub cursor_y: f32,
    /// 1-based.
    pub page_number: usize,
}

/// Where a row was committed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub page_number: usize,
    /// Top of the row.
    pub y: f32,
    pub height: f32,
    /// The row was taller than an empty page and runs past `bottom_limit`.
    pub overflows: bool,
}

impl Placement {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Outcome of asking for room on the current page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fit {
    Place(Placement, PageState),
    BreakRequired,
}

impl PageState {
    pub fn start(frame: &PageFrame) -> Self {
        Self {
            cursor_y: frame.rows_top(),
            page_number: 1,
        }
    }

    pub fn at_page_top(&self, frame: &PageFrame) -> bool {
        (self.cursor_y - frame.rows_top()).abs() < 1e-3
    }

    pub fn fits(&self, frame: &PageFrame, height: f32) -> bool {
        self.cursor_y + height <= frame.bottom_limit
    }

    /// Decide where a block of `height` goes. A block that does not fit needs
    /// a page break, unless the page is still empty: a block taller than a
    /// whole page is committed at the top of its page rather than split.
    pub fn fit(self, frame: &PageFrame, height: f32) -> Fit {
        if !self.fits(frame, height) && !self.at_page_top(frame) {
            return Fit::BreakRequired;
        }
        let (placement, next) = self.commit(frame, height);
        Fit::Place(placement, next)
    }

    /// Commit a block at the cursor without checking for room.
    pub fn commit(self, frame: &PageFrame, height: f32) -> (Placement, PageState) {
        let placement = Placement {
            page_number: self.page_number,
            y: self.cursor_y,
            height,
            overflows: !self.fits(frame, height),
        };
        let next = PageState {
            cursor_y: self.cursor_y + height,
            ..self
        };
        (placement, next)
    }

    pub fn next_page(self, frame: &PageFrame) -> Self {
        Self {
            cursor_y: frame.rows_top(),
            page_number: self.page_number + 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    OnPage,
    /// The last requested block does not fit; `break_page` must come next.
    PageBreakRequired,
    /// A fresh page was started and its table header drawn; nothing placed yet.
    HeaderDrawn,
    Finished,
}

/// The pagination state machine. Blocks are placed strictly in the order
/// they are offered, and always whole.
#[derive(Debug)]
pub struct Paginator {
    frame: PageFrame,
    state: PageState,
    phase: Phase,
}

impl Paginator {
    pub fn new(frame: PageFrame) -> Self {
        Self {
            state: PageState::start(&frame),
            frame,
            phase: Phase::OnPage,
        }
    }

    pub fn frame(&self) -> &PageFrame {
        &self.frame
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn page_count(&self) -> usize {
        self.state.page_number
    }

    /// Try to commit a block of `height` to the current page.
    pub fn place(&mut self, height: f32) -> Result<Fit, Error> {
        match self.phase {
            Phase::Finished => return Err(Error::Render("paginator already finished".into())),
            Phase::PageBreakRequired => {
                return Err(Error::Render("page break pending; start a new page first".into()));
            }
            Phase::OnPage | Phase::HeaderDrawn => {}
        }
        let fit = self.state.fit(&self.frame, height);
        match fit {
            Fit::Place(placement, next) => {
                if placement.overflows {
                    log::warn!(
                        "Block of height {:.1} exceeds page capacity {:.1}; placed alone on page {}",
                        height,
                        self.frame.capacity(),
                        placement.page_number
                    );
                }
                self.state = next;
                self.phase = Phase::OnPage;
            }
            Fit::BreakRequired => {
                log::debug!(
                    "Page break before block h={:.1} at cursor={:.1} (limit {:.1})",
                    height,
                    self.state.cursor_y,
                    self.frame.bottom_limit
                );
                self.phase = Phase::PageBreakRequired;
            }
        }
        Ok(fit)
    }

    /// Finalize the current page and move to the top of the next one. The
    /// caller draws the header for the new page before placing anything on it.
    pub fn break_page(&mut self) -> Result<PageState, Error> {
        if self.phase != Phase::PageBreakRequired {
            return Err(Error::Render(format!("no page break pending (phase {:?})", self.phase)));
        }
        self.state = self.state.next_page(&self.frame);
        self.phase = Phase::HeaderDrawn;
        Ok(self.state)
    }

    /// Returns the final page count. No placement is accepted afterwards.
    pub fn finish(&mut self) -> Result<usize, Error> {
        match self.phase {
            Phase::PageBreakRequired => Err(Error::Render("cannot finish with a page break pending".into())),
            Phase::Finished => Err(Error::Render("paginator already finished".into())),
            Phase::OnPage | Phase::HeaderDrawn => {
                self.phase = Phase::Finished;
                Ok(self.state.page_number)
            }
        }
    }
}

/// Run the engine over a whole sequence of block heights.
pub fn paginate(frame: PageFrame, heights: &[f32]) -> Vec<Placement> {
    let mut state = PageState::start(&frame);
    let mut out = Vec::with_capacity(heights.len());
    for &h in heights {
        let (placement, next) = match state.fit(&frame, h) {
            Fit::Place(p, next) => (p, next),
            Fit::BreakRequired => state.next_page(&frame).commit(&frame, h),
        };
        out.push(placement);
        state = next;
    }
    out
}
