/// Line-oriented scroll window over a block of text.
///
/// The offset always stays within `0..=max_y_offset()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewport {
    width: u16,
    height: u16,
    y_offset: usize,
    lines: Vec<String>,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn y_offset(&self) -> usize {
        self.y_offset
    }

    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    pub fn set_content(&mut self, content: &str) {
        self.lines = if content.is_empty() {
            Vec::new()
        } else {
            content.split('\n').map(str::to_string).collect()
        };
        self.clamp_offset();
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.clamp_offset();
    }

    pub fn max_y_offset(&self) -> usize {
        self.lines.len().saturating_sub(usize::from(self.height))
    }

    pub fn at_top(&self) -> bool {
        self.y_offset == 0
    }

    pub fn at_bottom(&self) -> bool {
        self.y_offset >= self.max_y_offset()
    }

    pub fn goto_top(&mut self) {
        self.y_offset = 0;
    }

    pub fn goto_bottom(&mut self) {
        self.y_offset = self.max_y_offset();
    }

    pub fn line_up(&mut self, n: usize) {
        self.y_offset = self.y_offset.saturating_sub(n);
    }

    pub fn line_down(&mut self, n: usize) {
        self.y_offset = self.y_offset.saturating_add(n).min(self.max_y_offset());
    }

    pub fn visible_lines(&self) -> &[String] {
        let start = self.y_offset.min(self.lines.len());
        let end = start
            .saturating_add(usize::from(self.height))
            .min(self.lines.len());
        &self.lines[start..end]
    }

    pub fn view(&self) -> String {
        self.visible_lines().join("\n")
    }

    fn clamp_offset(&mut self) {
        self.y_offset = self.y_offset.min(self.max_y_offset());
    }
}
