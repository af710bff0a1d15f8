//! Fixed-width CIF feed builder for the pipeline tests.

pub struct FeedBuilder {
    lines: Vec<String>,
}

fn pad(mut line: String, width: usize) -> String {
    while line.len() < width {
        line.push(' ');
    }
    line
}

impl Default for FeedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedBuilder {
    pub fn new() -> Self {
        FeedBuilder {
            lines: vec![
                pad("HDTPS.UDFROC1.PD2401010101240000DFROC1A       FA010124311224".to_string(), 80),
                pad("TIYORK   00000000YORK                    00000  YRK00000".to_string(), 80),
            ],
        }
    }

    pub fn schedule(mut self, uid: &str, valid_from: &str, valid_to: &str, days: &str, flag: char) -> Self {
        let mut line = pad(format!("BSN{uid:<6}{valid_from}{valid_to}{days} POO"), 79);
        line.push(flag);
        self.lines.push(line);
        self
    }

    pub fn operator(mut self, operator: &str) -> Self {
        self.lines.push(pad(format!("BX{:<9}{operator:<2}", ""), 80));
        self
    }

    pub fn origin(mut self, tiploc: &str, time: &str) -> Self {
        self.lines.push(pad(format!("LO{tiploc:<8}{time} {time}"), 80));
        self
    }

    pub fn calls_at(mut self, tiploc: &str, time: &str) -> Self {
        self.lines
            .push(pad(format!("LI{tiploc:<8}{time} {time} {:5}{time}{time}", ""), 80));
        self
    }

    pub fn passes(mut self, tiploc: &str, time: &str) -> Self {
        self.lines.push(pad(format!("LI{tiploc:<8}{:10}{time} 00000000", ""), 80));
        self
    }

    pub fn terminates(mut self, tiploc: &str, time: &str) -> Self {
        self.lines.push(pad(format!("LT{tiploc:<8}{time} {time}"), 80));
        self
    }

    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    /// The feed as it would be read from an MCA file.
    pub fn build(mut self) -> String {
        self.lines.push(pad("ZZ".to_string(), 80));
        let mut text = self.lines.join("\r\n");
        text.push_str("\r\n");
        text
    }
}
