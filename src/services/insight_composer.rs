// src/services/insight_composer.rs
use crate::models::{
    DominantColor, FeatureSet, Format, Insights, LightingType, ScoreCategory, SharpnessTier,
    SocialPlatform,
};

pub const VIRAL_READY_SCORE: f64 = 4.5;
pub const HIGH_POTENTIAL_SCORE: f64 = 3.0;
pub const ROOM_TO_GROW_SCORE: f64 = 1.5;

pub const HIGH_RESOLUTION_MP: f64 = 2.0;
pub const LOW_RESOLUTION_MP: f64 = 0.5;
pub const BRIGHT_IMAGE_LEVEL: u8 = 150;
pub const DARK_IMAGE_LEVEL: u8 = 80;
pub const SATURATION_RICH_PCT: f64 = 40.0;
pub const SATURATION_MUTED_PCT: f64 = 15.0;
pub const VIBRANCY_RICH_PCT: f64 = 30.0;
pub const VIBRANCY_FLAT_PCT: f64 = 10.0;

const RESEARCH_TIPS: [&str; 4] = [
    "Images with faces receive 38% more engagement",
    "Bright, high-contrast images perform better in feeds",
    "Square and portrait formats optimize for mobile viewing",
    "Visual storytelling increases emotional connection",
];

/// Score bands are closed-open, checked highest first.
pub fn categorize(score: f64) -> ScoreCategory {
    if score >= VIRAL_READY_SCORE {
        ScoreCategory::ViralReady
    } else if score >= HIGH_POTENTIAL_SCORE {
        ScoreCategory::HighPotential
    } else if score >= ROOM_TO_GROW_SCORE {
        ScoreCategory::RoomToGrow
    } else {
        ScoreCategory::NeedsWork
    }
}

pub fn describe(category: ScoreCategory) -> &'static str {
    match category {
        ScoreCategory::ViralReady => {
            concat!(
                "This image has exceptional viral potential! ",
                "It contains highly engaging visual elements."
            )
        }
        ScoreCategory::HighPotential => {
            "This image shows strong potential for engagement with appealing visual content."
        }
        ScoreCategory::RoomToGrow => {
            "This image has moderate appeal and may receive average engagement."
        }
        ScoreCategory::NeedsWork => {
            "This image may struggle to gain traction on social media platforms."
        }
    }
}

fn platform_tips(features: &FeatureSet) -> Vec<String> {
    let tips: &[&str] = match features.composition.social_optimized {
        Some(SocialPlatform::InstagramSquare) => &[
            "Square posts display fully in the Instagram grid and feed",
            "Keep the subject centered so the grid thumbnail stays readable",
        ],
        Some(SocialPlatform::InstagramPortrait) => &[
            "4:5 portrait posts take up the most vertical feed space on Instagram",
            "Place key details in the middle so the grid crop keeps them",
        ],
        Some(SocialPlatform::InstagramStory) => &[
            "Leave the top and bottom 250px clear of text for Story overlays",
            "Full-screen vertical content suits Stories and Reels covers",
        ],
        Some(SocialPlatform::FacebookCover) => &[
            "Facebook crops cover photos differently on mobile; keep the subject centered",
            "Avoid small text, covers are often viewed at reduced size",
        ],
        Some(SocialPlatform::TwitterHeader) => &[
            "The profile picture overlaps the lower left of Twitter headers",
            "Keep important content in the central band of the header",
        ],
        None => match features.composition.format {
            Format::Landscape => &[
                "Landscape images suit Twitter posts, Facebook links and YouTube thumbnails",
                "Consider a 4:5 or square crop for Instagram feeds",
            ],
            Format::Portrait => &[
                "Portrait images suit Pinterest pins and Instagram portrait posts",
                "A 9:16 crop would fit Stories and Reels",
            ],
            Format::Square => &[
                "Near-square images work across most feeds",
                "An exact 1:1 crop avoids letterboxing on Instagram",
            ],
        },
    };

    tips.iter().map(|tip| tip.to_string()).collect()
}

/// Turns the model score and the heuristic measurements into categorized
/// observations. Rules run in a fixed order so output lists are stable.
pub fn compose(score: f64, features: &FeatureSet) -> Insights {
    let category = categorize(score);
    let strong = score >= HIGH_POTENTIAL_SCORE;

    let mut positives = Vec::new();
    let mut improvements = Vec::new();
    let mut insights = Vec::new();

    // resolution
    let megapixels = features.dimensions.megapixels;
    if megapixels > HIGH_RESOLUTION_MP {
        positives.push(format!("High resolution ({:.1}MP) - great for detail", megapixels));
    } else if megapixels < LOW_RESOLUTION_MP {
        improvements.push("Higher resolution would improve image quality".to_string());
    }

    // platform / format
    match features.composition.social_optimized {
        Some(platform) => positives.push(format!("Optimized for {}", platform.label())),
        None => insights.push(format!(
            "Format: {} ({:.2}:1 ratio)",
            features.composition.format.label(),
            features.composition.aspect_ratio
        )),
    }

    // lighting
    match features.lighting.lighting_type {
        LightingType::BrightAiry if strong => {
            positives.push("Bright, airy lighting appeals to social media audiences".to_string())
        }
        LightingType::DramaticContrasted if strong => {
            positives.push("Dramatic lighting creates visual impact".to_string())
        }
        LightingType::DarkMoody => {
            if strong {
                positives
                    .push("Moody lighting gives the image a distinctive atmosphere".to_string());
            } else {
                improvements
                    .push("Brightening the shadows could help the image stand out".to_string());
            }
        }
        LightingType::EvenSoft => {
            if strong {
                positives.push("Soft, even lighting provides professional look".to_string());
            } else {
                improvements
                    .push("Try more dynamic lighting for greater visual interest".to_string());
            }
        }
        LightingType::Balanced => {
            insights.push("Balanced tonal range across shadows and highlights".to_string())
        }
        LightingType::BrightAiry | LightingType::DramaticContrasted => {}
    }

    // brightness
    let brightness = features.colors.average_brightness;
    if brightness > BRIGHT_IMAGE_LEVEL && strong {
        positives.push("Bright images tend to perform well on social media".to_string());
    } else if brightness < DARK_IMAGE_LEVEL && !strong {
        improvements.push("Darker images may struggle for attention in social feeds".to_string());
    }

    // saturation
    let saturation = features.colors.saturation_pct;
    if saturation > SATURATION_RICH_PCT {
        positives.push(format!("Rich, saturated colors ({:.0}%) catch the eye", saturation));
    } else if saturation < SATURATION_MUTED_PCT {
        improvements.push("Boosting color saturation could make the image pop".to_string());
    }

    // vibrancy
    let vibrancy = features.colors.vibrancy_pct;
    if vibrancy > VIBRANCY_RICH_PCT {
        positives.push("Vibrant colors stand out in crowded feeds".to_string());
    } else if vibrancy < VIBRANCY_FLAT_PCT {
        improvements
            .push("Colors look flat; brighter, more vivid tones would add energy".to_string());
    }

    // dominant color
    if features.colors.dominant_color != DominantColor::Neutral {
        insights.push(format!("Color palette: {}", features.colors.dominant_color.label()));
    }

    // sharpness
    match features.sharpness.tier {
        SharpnessTier::High => positives.push("Sharp, crisp image quality".to_string()),
        SharpnessTier::Medium => {}
        SharpnessTier::Low | SharpnessTier::VeryLow => {
            improvements.push("Sharper focus could improve visual appeal".to_string())
        }
    }

    insights.push(
        match category {
            ScoreCategory::ViralReady => "This image has multiple viral elements working together!",
            ScoreCategory::HighPotential => "This image has good engagement potential",
            ScoreCategory::RoomToGrow => "Room for improvement to increase engagement",
            ScoreCategory::NeedsWork => "Several factors could be optimized for better performance",
        }
        .to_string(),
    );

    Insights {
        category,
        description: describe(category).to_string(),
        positives,
        improvements,
        insights,
        platform_tips: platform_tips(features),
        research_tips: RESEARCH_TIPS.iter().map(|tip| tip.to_string()).collect(),
    }
}
