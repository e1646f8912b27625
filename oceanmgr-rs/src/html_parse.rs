use std::collections::HashMap;

// Class tokens marking the tracked container and its label child on the
// pool stats page.
static CONTAINER_CLASS: &str = "dashboard-container";
static LABEL_CLASS: &str = "label";

// Sub-scope inside the tracked container: a label or value capture.
// Text is taken from runs one level below the opening tag; a later run
// overwrites an earlier one, so the last non-blank run wins.
#[derive(Debug, Default)]
struct SubScope {
    active: bool,
    level: usize,
    text: String,
}

impl SubScope {
    fn open(&mut self, level: usize) {
        self.active = true;
        self.level = level;
        self.text.clear();
    }
}

#[derive(Debug)]
enum ContainerScope {
    NoActiveContainer,
    InContainer {
        level: usize,
        label: SubScope,
        value: SubScope,
    },
}

// Extraction state for one document. All state lives here, so independent
// documents can be extracted concurrently.
#[derive(Debug)]
struct ExtractState {
    values: HashMap<String, String>,
    tag_stack: Vec<String>,
    level: usize,
    scope: ContainerScope,
}

impl ExtractState {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            tag_stack: Vec::new(),
            level: 0,
            scope: ContainerScope::NoActiveContainer,
        }
    }

    fn handle_start_tag(&mut self, tag: &str, class: &str) {
        if tag == "div" {
            match &mut self.scope {
                ContainerScope::NoActiveContainer => {
                    if class.contains(CONTAINER_CLASS) {
                        // Containers are assumed non-nested; if the page ever
                        // nests them, only the outermost one is tracked.
                        self.scope = ContainerScope::InContainer {
                            level: self.level,
                            label: SubScope::default(),
                            value: SubScope::default(),
                        };
                        // println!("== Opened container, class {class}, {}", self.level);
                    }
                }
                ContainerScope::InContainer { level, label, .. } => {
                    if self.level == *level + 1 && class.contains(LABEL_CLASS) {
                        label.open(self.level);
                        // println!("== Opened label, class {class}, {}", self.level);
                    }
                }
            }
        }
        if tag == "span" {
            if let ContainerScope::InContainer { level, value, .. } = &mut self.scope {
                if self.level == *level + 1 {
                    value.open(self.level);
                }
            }
        }

        self.tag_stack.push(tag.to_string());
        self.level += 1;
    }

    // A close for a tag that is not the innermost open one first synthesizes
    // closes for everything above it (unclosed tags like <br>), oldest open
    // last. A close that matches nothing on the stack is dropped. Best-effort
    // only, deeply malformed input is not guaranteed to recover cleanly.
    fn handle_end_tag(&mut self, tag: &str) {
        if !self.tag_stack.iter().any(|t| t == tag) {
            return;
        }
        while let Some(last) = self.tag_stack.last() {
            if last == tag {
                break;
            }
            let last = last.clone();
            self.close_tag(&last);
        }
        self.close_tag(tag);
    }

    fn close_tag(&mut self, tag: &str) {
        self.tag_stack.pop();
        self.level = self.level.saturating_sub(1);

        if tag == "div" {
            let mut commit: Option<(String, String)> = None;
            if let ContainerScope::InContainer { level, label, value } = &mut self.scope {
                if self.level == *level {
                    // println!("==== Closed container  Label '{}'  Value '{}'", label.text, value.text);
                    commit = Some((label.text.clone(), value.text.clone()));
                } else if label.active && self.level == label.level {
                    label.active = false;
                }
            }
            if let Some((label, value)) = commit {
                self.values.insert(label, value);
                self.scope = ContainerScope::NoActiveContainer;
            }
        }
        if tag == "span" {
            if let ContainerScope::InContainer { value, .. } = &mut self.scope {
                if value.active && self.level == value.level {
                    value.active = false;
                }
            }
        }
    }

    fn handle_data(&mut self, data: &str) {
        let data_strip = data.trim();
        if data_strip.is_empty() {
            return;
        }
        if let ContainerScope::InContainer { label, value, .. } = &mut self.scope {
            if label.active && self.level == label.level + 1 {
                label.text = data_strip.to_string();
                // println!("== Label: '{}'", label.text);
            }
            if value.active && self.level == value.level + 1 {
                value.text = data_strip.to_string();
                // println!("== Value: '{}'", value.text);
            }
        }
    }

    // One left-to-right pass over the markup, no tree is built.
    // A '<' that does not start a tag is treated as text. An unterminated
    // tag at end-of-input ends the scan, so a truncated container commits
    // nothing.
    fn feed(&mut self, html: &str) {
        let bytes = html.as_bytes();
        let len = bytes.len();
        let mut pos = 0;
        let mut text_start = 0;

        while pos < len {
            if bytes[pos] != b'<' {
                pos += 1;
                continue;
            }
            let tag_start = match bytes.get(pos + 1) {
                Some(c) => c.is_ascii_alphabetic() || *c == b'/' || *c == b'!' || *c == b'?',
                None => false,
            };
            if !tag_start {
                pos += 1;
                continue;
            }

            if text_start < pos {
                self.handle_data(&html[text_start..pos]);
            }

            if html[pos..].starts_with("<!--") {
                // comment, no data inside
                pos = match html[pos + 4..].find("-->") {
                    Some(i) => pos + 4 + i + 3,
                    None => len,
                };
                text_start = pos;
                continue;
            }
            if bytes[pos + 1] == b'!' || bytes[pos + 1] == b'?' {
                // doctype or processing instruction
                pos = match html[pos..].find('>') {
                    Some(i) => pos + i + 1,
                    None => len,
                };
                text_start = pos;
                continue;
            }

            let gt = match html[pos..].find('>') {
                Some(i) => pos + i,
                // truncated tag, stop here
                None => return,
            };
            let inner = &html[pos + 1..gt];

            if let Some(end_name) = inner.strip_prefix('/') {
                let name = first_word(end_name).to_lowercase();
                if !name.is_empty() {
                    self.handle_end_tag(&name);
                }
                pos = gt + 1;
                text_start = pos;
                continue;
            }

            let inner_trim = inner.trim_end();
            let self_closing = inner_trim.ends_with('/');
            let body = if self_closing {
                inner_trim[..inner_trim.len() - 1].trim_end()
            } else {
                inner_trim
            };
            let name = first_word(body).to_lowercase();
            let attrs = &body[first_word(body).len()..];
            let class = attr_value(attrs, "class");

            self.handle_start_tag(&name, &class);
            if self_closing {
                self.handle_end_tag(&name);
            }
            pos = gt + 1;

            // script and style hold raw text, scan straight to their end tag
            if !self_closing && (name == "script" || name == "style") {
                let end_marker = format!("</{name}");
                pos = match find_ascii_ci(&html[pos..], &end_marker) {
                    Some(i) => pos + i,
                    // truncated raw-text element, stop here
                    None => return,
                };
            }
            text_start = pos;
        }

        if text_start < len {
            self.handle_data(&html[text_start..]);
        }
    }
}

fn first_word(s: &str) -> &str {
    let s = s.trim_start();
    match s.find(|c: char| c.is_ascii_whitespace()) {
        Some(i) => &s[..i],
        None => s,
    }
}

// Case-insensitive find, ASCII needles only
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    for i in 0..=(h.len() - n.len()) {
        if h[i..i + n.len()].eq_ignore_ascii_case(n) {
            return Some(i);
        }
    }
    None
}

// Return the value of an attribute from a start tag's attribute text,
// or "" when not present. Quoted and unquoted values are accepted.
fn attr_value(attrs: &str, attr_name: &str) -> String {
    let b = attrs.as_bytes();
    let mut i = 0;
    while i < b.len() {
        while i < b.len() && (b[i].is_ascii_whitespace() || b[i] == b'/') {
            i += 1;
        }
        if i >= b.len() {
            break;
        }
        let name_start = i;
        while i < b.len() && b[i] != b'=' && !b[i].is_ascii_whitespace() {
            i += 1;
        }
        let name = &attrs[name_start..i];
        while i < b.len() && b[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = "";
        if i < b.len() && b[i] == b'=' {
            i += 1;
            while i < b.len() && b[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < b.len() && (b[i] == b'"' || b[i] == b'\'') {
                let quote = b[i];
                i += 1;
                let value_start = i;
                while i < b.len() && b[i] != quote {
                    i += 1;
                }
                value = &attrs[value_start..i];
                if i < b.len() {
                    i += 1;
                }
            } else {
                let value_start = i;
                while i < b.len() && !b[i].is_ascii_whitespace() {
                    i += 1;
                }
                value = &attrs[value_start..i];
            }
        }
        if name.eq_ignore_ascii_case(attr_name) {
            return value.to_string();
        }
    }
    String::new()
}

// Extract label/value pairs from the known container pattern of the pool
// stats page. Returns an empty map for empty input; malformed markup
// degrades to missing entries, it never fails.
pub fn key_value_pairs_from_html(html: &str) -> HashMap<String, String> {
    let mut state = ExtractState::new();
    state.feed(html);
    state.values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_containers() {
        let html = r#"
            <html><body>
            <div class="stats dashboard-container">
              <div class="stat-label">Lifetime Earnings</div>
              <span>0.01 BTC</span>
            </div>
            <div class="dashboard-container">
              <div class="label">Unpaid Earnings</div>
              <span>0.002 BTC</span>
            </div>
            </body></html>"#;
        let values = key_value_pairs_from_html(html);
        assert_eq!(values.len(), 2);
        assert_eq!(values["Lifetime Earnings"], "0.01 BTC");
        assert_eq!(values["Unpaid Earnings"], "0.002 BTC");
    }

    #[test]
    fn test_empty_input() {
        let values = key_value_pairs_from_html("");
        assert_eq!(values.len(), 0);
    }

    #[test]
    fn test_truncated_container_commits_nothing() {
        let html = r#"<div class="dashboard-container"><div class="label">Earnings</div><span>1 BTC</span>"#;
        let values = key_value_pairs_from_html(html);
        assert_eq!(values.len(), 0);
    }

    #[test]
    fn test_truncated_tag_does_not_panic() {
        let html = r#"<div class="dashboard-container"><div class="label"#;
        let values = key_value_pairs_from_html(html);
        assert_eq!(values.len(), 0);
    }

    #[test]
    fn test_unclosed_tag_recovered_on_parent_close() {
        // <br> never closes; the container close must still commit
        let html = r#"<div class="dashboard-container"><div class="label">Hashrate<br>60 s</div><span>5.4 Ghps</span></div>"#;
        let values = key_value_pairs_from_html(html);
        assert_eq!(values.len(), 1);
        assert_eq!(values["Hashrate"], "5.4 Ghps");
    }

    #[test]
    fn test_stray_close_is_dropped() {
        let html = r#"</div></span><div class="dashboard-container"><div class="label">A</div><span>1</span></div>"#;
        let values = key_value_pairs_from_html(html);
        assert_eq!(values.len(), 1);
        assert_eq!(values["A"], "1");
    }

    #[test]
    fn test_last_direct_text_run_wins() {
        let html = r#"<div class="dashboard-container"><div class="label">Balance</div><span>old<b>deep</b>new</span></div>"#;
        let values = key_value_pairs_from_html(html);
        // runs nested deeper than the span are ignored, the last direct run wins
        assert_eq!(values["Balance"], "new");
    }

    #[test]
    fn test_deeper_containers_and_junk_ignored() {
        let html = r#"
            <div id="wrap">
              <!-- a comment with a <div> inside -->
              <script>var x = "</span>";</script>
              <div class="dashboard-container" data-id=7>
                <div class="label">
                  Estimated Rewards In Window
                </div>
                <span> 0.001 BTC </span>
                <div class="footnote">not a label</div>
              </div>
            </div>"#;
        let values = key_value_pairs_from_html(html);
        assert_eq!(values.len(), 1);
        assert_eq!(values["Estimated Rewards In Window"], "0.001 BTC");
    }

    #[test]
    fn test_container_without_label_text() {
        let html = r#"<div class="dashboard-container"><span>0.5 BTC</span></div>"#;
        let values = key_value_pairs_from_html(html);
        assert_eq!(values.len(), 1);
        assert_eq!(values[""], "0.5 BTC");
    }

    #[test]
    fn test_reusable_across_documents() {
        let html = r#"<div class="dashboard-container"><div class="label">A</div><span>1</span></div>"#;
        let first = key_value_pairs_from_html(html);
        let second = key_value_pairs_from_html(html);
        assert_eq!(first, second);
    }
}
