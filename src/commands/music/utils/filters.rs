//! Named ffmpeg audio filter presets offered by `/play` and `/filter`.

/// Audio effect applied through ffmpeg's `-af` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum FilterPreset {
    #[name = "Nightcore"]
    Nightcore,
    #[name = "Daycore"]
    Daycore,
    #[name = "Vaporwave"]
    Vaporwave,
    /// Removes any filter.
    #[name = "None"]
    None,
}

impl FilterPreset {
    /// The ffmpeg filter graph, or `None` for the reset choice.
    pub fn ffmpeg_filter(self) -> Option<&'static str> {
        match self {
            Self::Nightcore => Some("asetrate=48000*1.25,aresample=48000,atempo=1.1"),
            Self::Daycore => Some("asetrate=48000*0.8,aresample=48000,atempo=0.9"),
            Self::Vaporwave => Some("asetrate=44100*0.8,aresample=44100,atempo=0.9"),
            Self::None => None,
        }
    }

    /// Preset name for a filter graph, when it is one of ours.
    pub fn describe(filter: Option<&str>) -> String {
        let Some(filter) = filter else {
            return "none".to_string();
        };

        [Self::Nightcore, Self::Daycore, Self::Vaporwave]
            .into_iter()
            .find(|preset| preset.ffmpeg_filter() == Some(filter))
            .map(|preset| format!("{:?}", preset).to_lowercase())
            .unwrap_or_else(|| filter.to_string())
    }
}
