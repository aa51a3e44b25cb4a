//! The source rewriter: scans Lua source for string literals, encrypts
//! selected ones, and splices inline decryptor expressions in their place.

use log::debug;

use crate::config::ShroudConfig;
use crate::decryptor;
use crate::error::Result;
use crate::keytable::{xor_encrypt, KeyTable};
use crate::rng::{self, ShroudRng};
use crate::scanner::{self, LiteralMatch};

/// A scheduled substitution of `source[start..end)` with `replacement`.
///
/// Ranges are indices into the *original* source; applying them requires
/// processing in descending-`start` order so that earlier (lower-index)
/// ranges remain valid once a later, lower-index replacement has changed
/// the string's length.
#[derive(Clone, Debug, PartialEq)]
struct Replacement {
    start: usize,
    end: usize,
    text: String,
}

/// Rewrites Lua source text, replacing selected string literals with inline
/// decryptor expressions per `config`.
pub struct SourceRewriter {
    rng: Box<dyn ShroudRng>,
    next_id: usize,
}

impl SourceRewriter {
    pub fn new() -> Self {
        SourceRewriter { rng: rng::default_rng(), next_id: 0 }
    }

    pub fn with_rng(rng: Box<dyn ShroudRng>) -> Self {
        SourceRewriter { rng, next_id: 0 }
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Rewrite `source` according to `config`, returning the transformed
    /// text. Non-literal characters and unaffected literals are preserved
    /// verbatim; whitespace and comments are never reformatted.
    pub fn rewrite(&mut self, source: &str, config: &ShroudConfig) -> Result<String> {
        let matches = scanner::scan(source)?;
        let mut replacements = Vec::new();

        if config.encrypt_strings {
            self.stage_encrypt_all(&matches, config, &mut replacements);
        } else {
            self.stage_marked_only(&matches, config, &mut replacements);
        }
        if config.encrypt_important_strings {
            self.stage_important(&matches, config, &mut replacements);
        }

        Ok(apply_replacements(source, replacements))
    }

    /// `EncryptAllStrings`: one shared decryptor, sized to the longest
    /// matched literal, encrypts every literal in the source.
    fn stage_encrypt_all(
        &mut self,
        matches: &[LiteralMatch],
        config: &ShroudConfig,
        out: &mut Vec<Replacement>,
    ) {
        if matches.is_empty() {
            return;
        }
        let longest = matches.iter().map(|m| m.content.len()).max().unwrap_or(0);
        let key = KeyTable::generate(&mut *self.rng, longest, config.decrypt_table_len);
        for m in matches {
            let cipher = xor_encrypt(&m.content, &key);
            let id = self.next_id();
            out.push(Replacement { start: m.start, end: m.end, text: decryptor::emit(id, &key, &cipher) });
        }
    }

    /// `MarkedOnly`: a fresh decryptor per sentinel-marked literal, sized to
    /// that literal's own length.
    fn stage_marked_only(
        &mut self,
        matches: &[LiteralMatch],
        config: &ShroudConfig,
        out: &mut Vec<Replacement>,
    ) {
        for m in matches {
            if !m.marked {
                continue;
            }
            let key = KeyTable::generate(&mut *self.rng, m.content.len(), config.decrypt_table_len);
            let cipher = xor_encrypt(&m.content, &key);
            let id = self.next_id();
            out.push(Replacement { start: m.start, end: m.end, text: decryptor::emit(id, &key, &cipher) });
        }
    }

    /// `ImportantStrings`: a fresh decryptor per literal whose decoded
    /// content contains a sensitive-looking substring, independent of the
    /// other two stages.
    fn stage_important(
        &mut self,
        matches: &[LiteralMatch],
        config: &ShroudConfig,
        out: &mut Vec<Replacement>,
    ) {
        for m in matches {
            if !scanner::is_important(&m.content) {
                continue;
            }
            let key = KeyTable::generate(&mut *self.rng, m.content.len(), config.decrypt_table_len);
            let cipher = xor_encrypt(&m.content, &key);
            let id = self.next_id();
            out.push(Replacement { start: m.start, end: m.end, text: decryptor::emit(id, &key, &cipher) });
        }
    }
}

impl Default for SourceRewriter {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_replacements(source: &str, mut replacements: Vec<Replacement>) -> String {
    replacements.sort_by(|a, b| b.start.cmp(&a.start));
    let mut buf = source.as_bytes().to_vec();
    // Splicing strictly right-to-left only keeps earlier (lower-index)
    // ranges valid as long as ranges never overlap. Two independent stages
    // can both schedule a replacement for the same literal (e.g. a
    // sentinel-marked literal that is also "important"); `frontier` tracks
    // the start of the closest-to-the-left range already applied, in
    // original source coordinates, so a later (but lower- or equal-start)
    // replacement that would overrun into it is skipped instead of
    // splicing into already-replaced text.
    let mut frontier = source.len();
    for r in replacements {
        if r.start > r.end || r.end > source.len() {
            debug!("skipping out-of-bounds replacement [{}, {})", r.start, r.end);
            continue;
        }
        if r.end > frontier {
            debug!("skipping overlapping replacement [{}, {})", r.start, r.end);
            continue;
        }
        buf.splice(r.start..r.end, r.text.into_bytes());
        frontier = r.start;
    }
    String::from_utf8(buf).expect("replacements only insert valid UTF-8 Lua source")
}
