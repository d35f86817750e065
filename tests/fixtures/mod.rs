//! Canned critiques and image bytes for pipeline tests

/// Eight bytes of PNG signature plus the start of an IHDR chunk.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

/// A critique in the format the prompt asks for.
pub const MARKDOWN_CRITIQUE: &str = "
## Opening Verdict
Congratulations, you have photographed fog. On purpose, I hope.

## Under the Microscope
1. Composition: the horizon slopes like it is trying to leave.
2. Technical Quality: sharp where nothing happens.

## Final Sentence
- **Composition**: 4/10 - the horizon needs a spirit level
- **Technical Quality**: 6.5/10 - focus found the wrong tree
- **Artistic Merit**: 5/10 - moody, or merely grey
- **Lighting**: 7/10 - the fog did the work
- **Subject Matter**: 3/10 - what am I looking at
- **Post-processing**: 8/10 - tasteful, for once

**Closing Remark**: A brave attempt at saying nothing beautifully.
";

/// A critique in the Chinese verdict layout.
pub const CHINESE_CRITIQUE: &str = "
## ⚖️ 最终判决（评分）
- **构图**: 9分 - 教科书级别的和谐
- **技术质量**: 8.5分 - 扎实得令人发指
- **艺术价值**: 9分 - 触动了灵魂
- **光线**: 10分 - 塑造了神性轮廓
- **主体**: 8分 - 鹤立鸡群
- **后期处理**: 7.5分 - 锦上添花
";

/// Overall expected for [`MARKDOWN_CRITIQUE`]: (4 + 6.5 + 5 + 7 + 3 + 8) / 6 = 5.58
pub const MARKDOWN_OVERALL: f64 = 5.6;

/// Overall expected for [`CHINESE_CRITIQUE`]: (9 + 8.5 + 9 + 10 + 8 + 7.5) / 6 = 8.67
pub const CHINESE_OVERALL: f64 = 8.7;
