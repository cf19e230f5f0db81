//! Story text composition from theme-keyed story elements.
//!
//! Every template yields five blank-line-separated paragraphs, so a composed
//! story paginates to five pages (six with a custom prompt appended).

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::story::Theme;

struct StoryElements {
    settings: &'static [&'static str],
    companions: &'static [&'static str],
    challenges: &'static [&'static str],
    lessons: &'static [&'static str],
}

static ADVENTURE: StoryElements = StoryElements {
    settings: &[
        "enchanted forest with glowing mushrooms",
        "floating islands in the sunset sky",
        "crystal caves filled with rainbow gems",
        "ancient ruins with magical doorways",
        "magical treehouse that changes seasons",
        "underwater city of merfolk",
        "cloud castle above the storms",
        "desert oasis with flying carpets",
        "lost valley of friendly dragons",
        "mysterious garden of talking flowers",
    ],
    companions: &[
        "wise owl with spectacles",
        "playful baby dragon",
        "time-traveling unicorn",
        "rainbow-feathered phoenix",
        "mischievous fairy with starlight wings",
        "talking map with a sense of humor",
        "brave knight made of living origami",
        "floating lantern with a gentle soul",
        "magical compass that points to dreams",
        "friendly ghost who loves adventures",
    ],
    challenges: &[
        "crossing a bridge made of starlight",
        "solving riddles from ancient trees",
        "helping lost magical creatures find home",
        "finding a treasure that grants wishes",
        "restoring colors to a faded rainbow",
        "waking up sleeping clouds",
        "teaching young dragons to fly",
        "building a bridge between two worlds",
        "collecting moonbeams in a jar",
        "finding the lost song of the wind",
    ],
    lessons: &[
        "courage comes from the heart",
        "true magic lies in believing",
        "imagination can change the world",
        "every friend is a new adventure",
        "kindness is the greatest power",
        "dreams can light the darkest path",
        "helping others brings joy",
        "being different makes you special",
        "every challenge makes you stronger",
        "adventure lives in everyday moments",
    ],
};

static SAFARI: StoryElements = StoryElements {
    settings: &[
        "golden savanna at sunrise",
        "misty rainforest canopy",
        "peaceful waterfall oasis",
        "hidden valley of rare animals",
        "ancient baobab grove at twilight",
        "moonlit watering hole",
        "butterfly-filled meadow",
        "elephant path through tall grass",
        "zebra crossing under rainbow",
        "giraffe lookout point",
    ],
    companions: &[
        "wise elephant matriarch",
        "playful giraffe twins",
        "brave lion cub",
        "clever meerkat family",
        "gentle zebra elder",
        "chatty parrot guide",
        "mysterious leopard",
        "helpful honey badger",
        "dancing flamingo",
        "stargazing cheetah",
    ],
    challenges: &[
        "guiding lost baby animals home",
        "protecting the last water source",
        "bringing rain to dry lands",
        "healing sick animals with herbs",
        "uniting different animal families",
        "finding rare night blooming flowers",
        "building bridges across rivers",
        "sharing limited resources",
        "warning others about danger",
        "creating peace between rivals",
    ],
    lessons: &[
        "nature connects all living things",
        "working together brings success",
        "every creature has value",
        "differences make us stronger",
        "caring for our environment",
        "patience brings rewards",
        "wisdom comes from listening",
        "change can be good",
        "small actions matter",
        "respect earns respect",
    ],
};

static FRIENDSHIP: StoryElements = StoryElements {
    settings: &[
        "magical garden of forever flowers",
        "rainbow meadow after rain",
        "starlit park with wish fountains",
        "cozy treehouse village",
        "enchanted playground at dawn",
        "butterfly sanctuary",
        "friendship bridge over gentle stream",
        "secret clubhouse in the clouds",
        "musical forest grove",
        "garden of glowing fireflies",
    ],
    companions: &[
        "shy butterfly with rainbow wings",
        "lonely cloud seeking friends",
        "musical bird who can't sing",
        "colorful chameleon artist",
        "friendly squirrel collector",
        "lost star looking for home",
        "dancing flower in need of sun",
        "echo learning to speak",
        "young tree growing alone",
        "misunderstood thunder",
    ],
    challenges: &[
        "organizing a welcome party",
        "cheering up the sad moon",
        "building a friendship rainbow",
        "sharing magical moments",
        "creating harmony in chaos",
        "finding common ground",
        "healing a broken heart",
        "learning to trust others",
        "celebrating differences",
        "overcoming shyness",
    ],
    lessons: &[
        "friendship grows like flowers",
        "everyone needs a friend",
        "sharing doubles the joy",
        "understanding takes time",
        "true friends accept you",
        "kindness creates bonds",
        "differences make friendship special",
        "friends help you grow",
        "together is better",
        "friendship is magic",
    ],
};

static KINDNESS: StoryElements = StoryElements {
    settings: &[
        "whispering woods of gentle thoughts",
        "heart valley in bloom",
        "kindness kingdom of helping hands",
        "giving garden of endless growth",
        "harmony hills at daybreak",
        "compassion cove by the sea",
        "gratitude grove in spring",
        "empathy island",
        "caring creek",
        "gentle meadow of new beginnings",
    ],
    companions: &[
        "gentle deer who helps others",
        "caring rabbit healer",
        "helpful hedgehog gardener",
        "loving dove messenger",
        "generous chipmunk baker",
        "kind wolf protector",
        "sharing bear",
        "nurturing mouse teacher",
        "thoughtful fox friend",
        "healing hummingbird",
    ],
    challenges: &[
        "spreading joy to the sad",
        "helping gardens grow",
        "sharing light in darkness",
        "healing wounded hearts",
        "creating smiles everywhere",
        "teaching kindness to others",
        "finding good in everything",
        "showing patience and care",
        "helping without reward",
        "understanding others' pain",
    ],
    lessons: &[
        "kindness ripples forever",
        "giving is receiving",
        "compassion heals all",
        "small acts matter most",
        "love grows when shared",
        "everyone deserves kindness",
        "gentle words have power",
        "helping lifts all hearts",
        "kindness starts with you",
        "care changes everything",
    ],
};

/// Free-text themes borrow the adventure elements.
fn elements_for(theme: &Theme) -> &'static StoryElements {
    match theme {
        Theme::Adventure | Theme::Custom(_) => &ADVENTURE,
        Theme::Safari => &SAFARI,
        Theme::Friendship => &FRIENDSHIP,
        Theme::Kindness => &KINDNESS,
    }
}

struct Picks<'a> {
    name: &'a str,
    setting: &'static str,
    companion: &'static str,
    challenge: &'static str,
    lesson: &'static str,
}

const TEMPLATE_COUNT: usize = 3;

fn render_template(index: usize, p: &Picks<'_>) -> String {
    let Picks {
        name,
        setting,
        companion,
        challenge,
        lesson,
    } = p;
    let paragraphs: [String; 5] = match index {
        0 => [
            format!("In a magical place called {setting}, there lived a wonderful child named {name}. One extraordinary day, {name} met a {companion} who became their special friend and guide."),
            format!("Together, they discovered that {setting} needed their help with {challenge}. {name}'s heart was filled with determination to make a difference."),
            format!("With courage and creativity, {name} and their new friend worked together, facing each challenge with a smile. They learned about {lesson} along the way."),
            format!("Their adventure brought joy and wonder to everyone they met, transforming {setting} into an even more magical place. {name}'s kindness and bravery made all the difference."),
            format!("As the stars began to twinkle in the evening sky, {name} realized that the greatest magic of all lies in our hearts, and that every act of kindness creates a new kind of wonder."),
        ],
        1 => [
            format!("Deep within the mystical {setting}, a remarkable child named {name} was about to begin an incredible journey. When a {companion} appeared with a special invitation, {name} knew this would be no ordinary day."),
            format!("The {companion} revealed that they needed help with {challenge}. Without hesitation, {name} agreed to help, feeling both excited and a little nervous about the adventure ahead."),
            format!("Through magical moments and surprising discoveries, {name} and their new friend worked together in ways they never imagined. Each step taught them more about {lesson}."),
            format!("Their efforts brought amazing changes to {setting}, touching the hearts of all who lived there. {name}'s presence made everything brighter and more beautiful."),
            format!("As the adventure came to an end, {name} understood that magic isn't just in enchanted places. It's in the way we care for others and believe in ourselves."),
        ],
        _ => [
            format!("Once upon a time, in the heart of {setting}, there was a special child named {name} who had a wonderful gift for making others smile. One magical morning, they encountered a {companion} who needed their help."),
            format!("The {companion} told {name} about {challenge}, and together they set off on an amazing journey. Along the way, they met many new friends who joined their quest."),
            format!("Through teamwork and determination, {name} showed everyone the importance of {lesson}. Their adventure brought positive changes to every corner of {setting}."),
            format!("Each step of their journey revealed new wonders and created lasting friendships. {name}'s kind heart and brave spirit inspired everyone they met."),
            format!("When the sun set on their magical day, {name} had not only helped solve the challenge but had also discovered the extraordinary power of believing in oneself and others."),
        ],
    };
    paragraphs.join("\n\n")
}

fn pick<R: Rng>(rng: &mut R, items: &'static [&'static str]) -> &'static str {
    items.choose(rng).copied().unwrap_or_default()
}

/// Composes story text with an explicit RNG.
pub fn compose_story_with_rng<R: Rng>(
    rng: &mut R,
    child_name: &str,
    theme: &Theme,
    custom_prompt: Option<&str>,
) -> String {
    let elements = elements_for(theme);
    let picks = Picks {
        name: child_name.trim(),
        setting: pick(rng, elements.settings),
        companion: pick(rng, elements.companions),
        challenge: pick(rng, elements.challenges),
        lesson: pick(rng, elements.lessons),
    };
    let mut story = render_template(rng.gen_range(0..TEMPLATE_COUNT), &picks);

    if let Some(extra) = custom_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        story.push_str("\n\n");
        story.push_str(extra);
    }
    story
}

pub fn compose_story(child_name: &str, theme: &Theme, custom_prompt: Option<&str>) -> String {
    compose_story_with_rng(&mut rand::thread_rng(), child_name, theme, custom_prompt)
}
