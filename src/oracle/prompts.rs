//! Prompt templates for the two oracle calls.
//!
//! Placeholders are `{name}` tokens filled with [`render`]; literal braces in
//! the JSON examples need no escaping.

/// Extraction: transcript in, candidate profile delta out.
pub const EXTRACT_PROFILE_PROMPT: &str = r#"You read a conversation and extract facts about the user for their profile.
Reply with a single JSON object and nothing else.

## Output shape
```json
{
  "basic_info": {"name": "Li Ming", "current_city": "Hangzhou", "school_name": "Beijing Experimental Primary School", "grade": "Grade 3", "class_name": "Class 2"},
  "additional_profile": {
    "interests": [{"name": "photography", "degree": 4, "evidence": [{"text": "goes out taking photos every weekend"}]}],
    "skills": [{"name": "Python", "degree": 3, "evidence": [{"text": "wrote a small data tool"}]}],
    "personality": [{"name": "outgoing", "degree": 4, "evidence": [{"text": "loves meeting new people"}]}],
    "social_context": {
      "family": {"father": {"name": "Li Qiang", "info": ["doctor"]}, "brother": [{"name": null, "info": ["older brother"]}]},
      "friends": [{"name": "Jack", "info": ["plays basketball"]}],
      "others": [{"name": null, "relation": "uncle", "info": ["engineer"]}]
    },
    "learning_preferences": {"preferred_time": "evening", "preferred_style": "visual", "difficulty_level": "beginner"}
  }
}
```

## Rules
1. Keep the user's own language and wording. Never translate a fact into another language.
2. Evidence entries carry only "text". Do not add timestamps; the backend records time.
3. "degree" is an integer 1-5: liking for interests, proficiency for skills, strength for personality. Every item needs evidence quoted or paraphrased from the conversation.
4. basic_info keys are limited to: name, nickname, english_name, birthday (YYYY-MM-DD), gender, nationality, hometown, current_city, timezone, language, school_name, grade, class_name.
5. social_context:
   - family holds direct relatives only. Single-person keys are objects: father, mother, spouse, grandfather_paternal, grandmother_paternal, grandfather_maternal, grandmother_maternal. Multi-person keys are arrays: brother, sister, son, daughter, grandson, granddaughter.
   - Every family or friend entry has exactly "name" and "info". "name" is a real name or null, never a relation word like "wife".
   - Uncles, aunts, cousins, teachers, colleagues and anyone else go to "others" with "name", "relation" and "info".
6. learning_preferences is one object with preferred_time (morning/afternoon/evening), preferred_style (visual/auditory/kinesthetic) and difficulty_level (beginner/intermediate/advanced).
7. Extract only what is stated. Leave out keys you have no data for.

Current time: {current_time}

Conversation:
{messages}

Return the JSON object only."#;

/// Decision: extracted delta plus existing profile in, per-item operations out.
pub const UPDATE_PROFILE_PROMPT: &str = r#"Compare newly extracted profile facts with the user's existing profile and decide what to change.
Reply with a single JSON object and nothing else.

## Extracted
{extracted}

## Existing (ids are temporary numbers, evidence carries timestamps)
{existing}

## Output shape
```json
{
  "basic_info": {"current_city": "Shanghai"},
  "additional_profile": {
    "interests": [
      {"id": 1, "event": "UPDATE", "name": "soccer", "degree": 5, "evidence": [{"text": "won another match"}]},
      {"id": null, "event": "ADD", "name": "photography", "degree": 3, "evidence": [{"text": "bought a camera"}]}
    ],
    "personality": [{"id": 2, "event": "DELETE"}],
    "social_context": {
      "family": {"spouse": {"event": "ADD", "name": "Anna", "info": ["designer"]}}
    }
  }
}
```

## Rules
1. Keep the user's own language and wording.
2. Each list item carries "event": ADD (id null), UPDATE or DELETE (id copied from Existing). Existing items that need no change are simply left out.
3. Only use ids that appear in Existing. Never invent one.
4. Evidence lists contain only the new evidence, as {"text": ...}. The backend merges it with what is stored and adds timestamps.
5. basic_info is a plain object of changed values with no events.
6. social_context is merged key by key. Return only the relationships mentioned in the conversation, each with an event. Everything you leave out is kept as it is.
7. Contradictions: weigh new evidence against stored evidence. A single remark against several recent entries is usually a passing mood: skip it or lower the degree. Many recent entries against a few old ones mean a real change: DELETE the old item and ADD the new one. Opposite traits rarely coexist; only keep both when each has strong evidence in clearly different contexts.
8. Keep degree proportionate: one or two pieces of evidence support 1-2, three to five support 3, more support 4-5.
9. learning_preferences, when present, replaces the stored object entirely.

Return the JSON object only."#;

/// Substitute `{key}` placeholders in one pass over the template.
///
/// Inserted values are copied through as-is, so placeholder text inside a
/// value is never expanded. Braces that name no variable are kept.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let hit = vars.iter().find_map(|(key, value)| {
            tail.strip_prefix('{')
                .and_then(|t| t.strip_prefix(*key))
                .and_then(|t| t.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
