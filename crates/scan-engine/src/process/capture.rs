//! 출력 캡처 버퍼
//!
//! - [`XmlCapture`]: XML 선언(또는 `<nmaprun`)부터 `</nmaprun>`까지의 stdout 줄을 모읍니다.
//! - [`Transcript`]: XML이 아닌 출력을 진단용으로 보존합니다.
//!
//! 두 버퍼 모두 크기 상한이 있습니다.

/// XML 캡처 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaptureState {
    /// 문서 시작 대기
    Waiting,
    /// 문서 수집 중
    Capturing,
    /// 문서 종료 표식 확인
    Complete,
    /// 크기 상한 초과
    Overflow,
}

/// XML 문서 캡처
#[derive(Debug)]
pub(crate) struct XmlCapture {
    buf: String,
    state: CaptureState,
    max_bytes: usize,
}

impl XmlCapture {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            buf: String::new(),
            state: CaptureState::Waiting,
            max_bytes,
        }
    }

    pub(crate) fn state(&self) -> CaptureState {
        self.state
    }

    /// 한 줄을 넣습니다. XML 문서에 속한 줄이면 `true`를 반환합니다.
    pub(crate) fn push_line(&mut self, line: &str) -> bool {
        match self.state {
            CaptureState::Waiting => {
                let trimmed = line.trim_start();
                if trimmed.starts_with("<?xml") || trimmed.starts_with("<nmaprun") {
                    self.state = CaptureState::Capturing;
                    self.append(line);
                    true
                } else {
                    false
                }
            }
            CaptureState::Capturing => {
                self.append(line);
                true
            }
            // 상한 초과 이후의 문서 줄은 버림
            CaptureState::Overflow => true,
            CaptureState::Complete => false,
        }
    }

    fn append(&mut self, line: &str) {
        if self.buf.len() + line.len() + 1 > self.max_bytes {
            self.state = CaptureState::Overflow;
            self.buf = String::new();
            return;
        }
        self.buf.push_str(line);
        self.buf.push('\n');
        if line.contains("</nmaprun>") {
            self.state = CaptureState::Complete;
        }
    }

    /// 캡처된 문서를 반환합니다. 아무것도 캡처하지 못했거나 상한을 넘으면 `None`.
    pub(crate) fn into_xml(self) -> Option<String> {
        match self.state {
            CaptureState::Capturing | CaptureState::Complete if !self.buf.is_empty() => {
                Some(self.buf)
            }
            _ => None,
        }
    }
}

/// 진단용 출력 보존 버퍼
#[derive(Debug)]
pub(crate) struct Transcript {
    buf: String,
    max_bytes: usize,
    truncated: bool,
}

impl Transcript {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            buf: String::new(),
            max_bytes,
            truncated: false,
        }
    }

    pub(crate) fn push_line(&mut self, line: &str) {
        if self.truncated {
            return;
        }
        if self.buf.len() + line.len() + 1 > self.max_bytes {
            self.truncated = true;
            return;
        }
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    pub(crate) fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub(crate) fn into_string(self) -> String {
        self.buf
    }
}
