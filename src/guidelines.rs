/// Checklist appended to every advice report.
pub const GENERIC_WRITING_GUIDELINES: [&str; 12] = [
    "Open with a high-contrast hook that earns the next line.",
    "Use title-style capitalization for thread headers; avoid punctuation at the end of headers.",
    "Prefer newer, high-quality source material and examples.",
    "End each post with a punchy bar line designed to be shareable.",
    "Use clean, consistent spacing for readability.",
    "Be highly specific and actionable; avoid generic fluff.",
    "Include concrete how-to details, not just high-level points.",
    "Reference relevant people or brands naturally when useful.",
    "Diversify examples and avoid repetitive perspective bias.",
    "Include a clear CTA (follow, reply, bookmark, or link click).",
    "Use examples/templates whenever possible.",
    "Keep language original and avoid sounding formulaic.",
];
